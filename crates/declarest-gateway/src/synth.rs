// SPDX-FileCopyrightText: 2026 Declarest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Route synthesis: (descriptors, storage handles) -> request-handler table.
//!
//! A one-time, idempotent transform. Each synthesized handler is stateless
//! between invocations except through the storage layer; validation, auth
//! wrapping, and notification publishing all hang off the descriptor the
//! handler was bound to.

use std::sync::Arc;

use axum::{
    extract::rejection::JsonRejection,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::debug;

use declarest_core::{
    AuthPolicy, Entity, Error, Fields, Notifier, NotifyEvent, NotifySink, ResourceDescriptor,
    StoreHandle,
};

use crate::auth::{auth_middleware, AuthState, RequestVerifier};

/// Explicit context passed into synthesis; replaces any ambient registry.
///
/// Both capabilities are optional: a gateway without a verifier serves only
/// policy-free routes, and a gateway without a sink drops notifications.
#[derive(Clone, Default)]
pub struct GatewayContext {
    pub verifier: Option<Arc<dyn RequestVerifier>>,
    pub sink: Option<Arc<dyn NotifySink>>,
}

/// Auth override for one custom route.
pub enum RouteAuth {
    /// Use the resource-level policy, if any.
    Inherit,
    /// No auth, even inside an authed resource.
    Public,
    /// This policy, overriding the resource-level one.
    Require(AuthPolicy),
}

/// A non-CRUD route declared alongside a resource (or standalone).
pub struct CustomRoute {
    pub path: String,
    pub route: MethodRouter,
    pub auth: RouteAuth,
}

impl CustomRoute {
    pub fn new(path: impl Into<String>, route: MethodRouter) -> Self {
        CustomRoute {
            path: path.into(),
            route,
            auth: RouteAuth::Inherit,
        }
    }

    pub fn auth(mut self, auth: RouteAuth) -> Self {
        self.auth = auth;
        self
    }
}

/// One resource descriptor bound to its resolved storage handle.
pub struct ResourceBinding {
    pub descriptor: Arc<ResourceDescriptor>,
    pub store: StoreHandle,
    pub custom: Vec<CustomRoute>,
}

impl ResourceBinding {
    pub fn new(descriptor: ResourceDescriptor, store: StoreHandle) -> Self {
        ResourceBinding {
            descriptor: Arc::new(descriptor),
            store,
            custom: Vec::new(),
        }
    }

    pub fn custom(mut self, route: CustomRoute) -> Self {
        self.custom.push(route);
        self
    }
}

/// Per-resource handler state.
#[derive(Clone)]
struct ResourceState {
    descriptor: Arc<ResourceDescriptor>,
    store: StoreHandle,
    notifier: Notifier,
}

/// Synthesize the full router for a set of resources plus standalone custom
/// routes.
///
/// The notification topic whitelist is built here, once, from the declared
/// topics; it is read-only afterwards.
pub fn synthesize(
    bindings: Vec<ResourceBinding>,
    standalone: Vec<CustomRoute>,
    ctx: &GatewayContext,
) -> Result<Router, Error> {
    let topics: Vec<String> = bindings
        .iter()
        .filter_map(|b| b.descriptor.notify_topic().map(str::to_string))
        .collect();
    let notifier = Notifier::new(topics, ctx.sink.clone());

    let mut app = Router::new();
    for binding in bindings {
        debug!(
            base = binding.descriptor.base_path(),
            table = binding.descriptor.table_name(),
            "synthesizing resource routes"
        );
        app = app.merge(resource_router(binding, &notifier, ctx));
    }
    for route in standalone {
        app = app.merge(custom_router(route, None, ctx));
    }
    Ok(app)
}

fn resource_router(binding: ResourceBinding, notifier: &Notifier, ctx: &GatewayContext) -> Router {
    let ResourceBinding {
        descriptor,
        store,
        custom,
    } = binding;

    let base = descriptor.base_path().to_string();
    let item = format!("{base}/{{id}}");
    let mut router = Router::new()
        .route(&base, get(list_entities).post(create_entity))
        .route(
            &item,
            get(fetch_entity).put(update_entity).delete(delete_entity),
        );

    if let Some(policy) = descriptor.auth_policy() {
        router = router.route_layer(middleware::from_fn_with_state(
            AuthState {
                verifier: ctx.verifier.clone(),
                policy: policy.clone(),
            },
            auth_middleware,
        ));
    }

    let resource_policy = descriptor.auth_policy().cloned();
    let mut router = router.with_state(ResourceState {
        descriptor,
        store,
        notifier: notifier.clone(),
    });

    for route in custom {
        router = router.merge(custom_router(route, resource_policy.as_ref(), ctx));
    }
    router
}

fn custom_router(
    route: CustomRoute,
    resource_policy: Option<&AuthPolicy>,
    ctx: &GatewayContext,
) -> Router {
    let effective = match route.auth {
        RouteAuth::Inherit => resource_policy.cloned(),
        RouteAuth::Public => None,
        RouteAuth::Require(policy) => Some(policy),
    };

    let mut router = Router::new().route(&route.path, route.route);
    if let Some(policy) = effective {
        router = router.route_layer(middleware::from_fn_with_state(
            AuthState {
                verifier: ctx.verifier.clone(),
                policy,
            },
            auth_middleware,
        ));
    }
    router
}

// --- CRUD handlers ---

/// `GET base`: the full current collection.
async fn list_entities(State(state): State<ResourceState>) -> Result<Json<Vec<Entity>>, ApiError> {
    Ok(Json(state.store.read().await?))
}

/// `POST base`: validate, assign id and creation timestamp, persist, notify.
async fn create_entity(
    State(state): State<ResourceState>,
    body: Result<Json<Fields>, JsonRejection>,
) -> Result<(StatusCode, Json<Entity>), ApiError> {
    let Json(body) = body?;
    state.descriptor.validate_create(&body)?;

    let mut entity = state.descriptor.compose(body);
    if entity.id().is_none() {
        entity.set_id(uuid::Uuid::new_v4().to_string());
    }
    if entity.get("created_at").is_none() {
        entity.set("created_at", Value::String(chrono::Utc::now().to_rfc3339()));
    }

    state.store.insert(&entity).await?;

    if let Some(topic) = state.descriptor.notify_topic() {
        state
            .notifier
            .publish(NotifyEvent::create(topic, entity.clone()))
            .await;
    }
    Ok((StatusCode::CREATED, Json(entity)))
}

/// `GET base/{id}`.
async fn fetch_entity(
    State(state): State<ResourceState>,
    Path(id): Path<String>,
) -> Result<Json<Entity>, ApiError> {
    match state.store.find_by_id(&id).await? {
        Some(entity) => Ok(Json(entity)),
        None => Err(ApiError::not_found(&id)),
    }
}

/// `PUT base/{id}`: strip readonly fields, merge, re-assert id, notify with
/// the incoming patch only.
async fn update_entity(
    State(state): State<ResourceState>,
    Path(id): Path<String>,
    body: Result<Json<Fields>, JsonRejection>,
) -> Result<Json<Entity>, ApiError> {
    let Json(body) = body?;
    let patch = state.descriptor.sanitize_patch(body);

    let Some(merged) = state.store.update(&id, patch.clone()).await? else {
        return Err(ApiError::not_found(&id));
    };

    if let Some(topic) = state.descriptor.notify_topic() {
        state
            .notifier
            .publish(NotifyEvent::update(topic, id, patch))
            .await;
    }
    Ok(Json(merged))
}

/// `DELETE base/{id}`.
async fn delete_entity(
    State(state): State<ResourceState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.store.remove(&id).await? {
        return Err(ApiError::not_found(&id));
    }
    if let Some(topic) = state.descriptor.notify_topic() {
        state
            .notifier
            .publish(NotifyEvent::delete(topic, id))
            .await;
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- error boundary ---

/// The gateway's error boundary: every failure becomes a structured
/// `{ "error": <message> }` body with the status the taxonomy prescribes.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(id: &str) -> Self {
        ApiError::new(StatusCode::NOT_FOUND, format!("no entity with id `{id}`"))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Constraint { .. } => StatusCode::CONFLICT,
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::Config(_)
            | Error::Storage { .. }
            | Error::Gateway { .. }
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_documented_statuses() {
        let cases = [
            (Error::Validation { field: "title".into() }, StatusCode::BAD_REQUEST),
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                Error::Constraint { table: "t".into(), id: "i".into() },
                StatusCode::CONFLICT,
            ),
            (Error::Unauthenticated, StatusCode::UNAUTHORIZED),
            (Error::Forbidden { role: "admin".into() }, StatusCode::FORBIDDEN),
            (Error::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn validation_error_body_names_the_field() {
        let api: ApiError = Error::Validation { field: "title".into() }.into();
        assert!(api.message.contains("title"));
    }
}
