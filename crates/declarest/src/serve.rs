// SPDX-FileCopyrightText: 2026 Declarest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `declarest serve`: wire storage, descriptors, and gateway together and
//! run the HTTP/WebSocket server.

use std::sync::Arc;

use axum::Router;
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use declarest_core::{Error, FieldSpec, ResourceDescriptor, StoreHandle};
use declarest_gateway::{
    health_router, start_server, synthesize, GatewayContext, RequestVerifier, ResourceBinding,
    RouteAuth, ServerConfig, StaticTokenVerifier, WsHub,
};
use declarest_storage::{Database, SqliteTable, StorageHub};

use crate::config::AppConfig;
use crate::maintenance;

/// The resources this deployment serves.
///
/// Each descriptor is one declaration: base path, field rules, notification
/// topic, auth policy. Everything downstream (routes, tables, topics) is
/// synthesized from these.
fn descriptors() -> Result<Vec<ResourceDescriptor>, Error> {
    Ok(vec![
        ResourceDescriptor::builder("/api/todos")
            .field(FieldSpec::new("title").required())
            .field(FieldSpec::new("status").default_value(json!("pending")))
            .field(FieldSpec::new("created_at").readonly())
            .notify("todos")
            .build()?,
        ResourceDescriptor::builder("/api/notes")
            .field(FieldSpec::new("body").required())
            .field(FieldSpec::new("created_at").readonly())
            .notify("notes")
            .build()?,
    ])
}

/// Build the full application router over an installed database.
pub async fn build_app(config: &AppConfig, db: Database) -> Result<Router, Error> {
    let hub = Arc::new(StorageHub::new());
    hub.install(db.clone())?;

    let descriptors = descriptors()?;
    let topics: Vec<String> = descriptors
        .iter()
        .filter_map(|d| d.notify_topic().map(str::to_string))
        .collect();
    let ws_hub = Arc::new(WsHub::new(topics));

    let verifier: Option<Arc<dyn RequestVerifier>> =
        config.server.bearer_token.as_ref().map(|token| {
            Arc::new(StaticTokenVerifier::new().token(token.clone(), "operator", None))
                as Arc<dyn RequestVerifier>
        });
    let ctx = GatewayContext {
        verifier,
        sink: Some(ws_hub.clone()),
    };

    let mut bindings = Vec::new();
    for descriptor in descriptors {
        let table = SqliteTable::new(hub.clone(), descriptor.table_name())?;
        bindings.push(ResourceBinding::new(
            descriptor,
            StoreHandle::Granular(Arc::new(table)),
        ));
    }

    // Maintenance routes require the bearer token whenever one is set.
    let maintenance_auth = if config.server.bearer_token.is_some() {
        RouteAuth::Require(declarest_core::AuthPolicy::authenticated())
    } else {
        RouteAuth::Public
    };
    let standalone = maintenance::routes(db, maintenance_auth);

    let app = synthesize(bindings, standalone, &ctx)?
        .merge(health_router())
        .merge(WsHub::router(ws_hub))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

/// Open storage, build the router, and serve until shutdown.
pub async fn run(config: &AppConfig) -> Result<(), Error> {
    if let Some(parent) = config.storage.database_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(Error::storage)?;
    }
    let db = Database::open(&config.storage.database_path).await?;
    info!(path = %config.storage.database_path.display(), "storage engine ready");

    let app = build_app(config, db).await?;
    let server = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };
    start_server(&server, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::load_config_from_str;

    async fn app(dir: &tempfile::TempDir, toml: &str) -> Router {
        let config = load_config_from_str(toml).unwrap();
        let db = Database::open(dir.path().join("engine.db")).await.unwrap();
        build_app(&config, db).await.unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(path: &str, body: Value) -> Request<Body> {
        Request::post(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_and_crud_surface_are_served() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir, "").await;

        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(post_json("/api/todos", json!({"title": "x"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["status"], "pending");

        let response = app
            .clone()
            .oneshot(post_json("/api/notes", json!({"body": "hello"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn backup_download_restores_earlier_state() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir, "").await;

        app.clone()
            .oneshot(post_json("/api/todos", json!({"id": "keep", "title": "x"})))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/system/backup")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let snapshot = response.into_body().collect().await.unwrap().to_bytes();
        assert!(snapshot.starts_with(b"SQLite format 3\0"));

        app.clone()
            .oneshot(post_json("/api/todos", json!({"id": "drop", "title": "y"})))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/system/restore")
                    .header(header::CONTENT_TYPE, "application/octet-stream")
                    .body(Body::from(snapshot))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(Request::get("/api/todos").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let listed = body_json(response).await;
        let ids: Vec<&str> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["keep"]);
    }

    #[tokio::test]
    async fn bearer_token_guards_resources_and_maintenance() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(
            &dir,
            r#"
            [server]
            bearer_token = "s3cret"
            "#,
        )
        .await;

        // Resources stay open: no descriptor in this deployment declares a
        // policy. Maintenance routes require the token.
        let response = app
            .clone()
            .oneshot(Request::get("/api/todos").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/system/backup")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/system/backup")
                    .header(header::AUTHORIZATION, "Bearer s3cret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn empty_restore_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir, "").await;

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/system/restore")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
