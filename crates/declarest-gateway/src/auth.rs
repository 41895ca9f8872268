// SPDX-FileCopyrightText: 2026 Declarest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication wrapping for synthesized routes.
//!
//! Identity resolution is an injected, optional capability: the gateway
//! never knows how tokens are minted. A route with a policy but no
//! configured verifier rejects all requests (fail-closed).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use declarest_core::{AuthPolicy, Error};

use crate::synth::ApiError;

/// A verified caller.
#[derive(Debug, Clone)]
pub struct Identity {
    pub subject: String,
    pub role: Option<String>,
}

/// Capability that resolves an identity from an incoming request.
#[async_trait]
pub trait RequestVerifier: Send + Sync {
    /// `None` means the request carries no acceptable credentials.
    async fn verify(&self, headers: &HeaderMap) -> Option<Identity>;
}

/// Bearer-token verifier backed by a static token table.
///
/// The simplest realization of the verification capability; production
/// deployments inject their own [`RequestVerifier`].
#[derive(Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, Identity>,
}

impl StaticTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token mapping to an identity.
    pub fn token(
        mut self,
        token: impl Into<String>,
        subject: impl Into<String>,
        role: Option<&str>,
    ) -> Self {
        self.tokens.insert(
            token.into(),
            Identity {
                subject: subject.into(),
                role: role.map(str::to_string),
            },
        );
        self
    }
}

impl std::fmt::Debug for StaticTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenVerifier")
            .field("tokens", &format!("[{} redacted]", self.tokens.len()))
            .finish()
    }
}

#[async_trait]
impl RequestVerifier for StaticTokenVerifier {
    async fn verify(&self, headers: &HeaderMap) -> Option<Identity> {
        let token = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))?;
        self.tokens.get(token).cloned()
    }
}

/// State for the policy middleware: the injected verifier plus the policy
/// in force for the wrapped routes.
#[derive(Clone)]
pub struct AuthState {
    pub verifier: Option<Arc<dyn RequestVerifier>>,
    pub policy: AuthPolicy,
}

/// Middleware enforcing an [`AuthPolicy`].
///
/// No identity resolves to 401; an identity without the required role to
/// 403. On success the identity is attached to the request extensions for
/// the inner handler.
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(verifier) = &auth.verifier else {
        tracing::error!("route requires auth but no verifier is configured -- rejecting");
        return Err(Error::Unauthenticated.into());
    };

    let Some(identity) = verifier.verify(request.headers()).await else {
        return Err(Error::Unauthenticated.into());
    };

    if let Some(role) = &auth.policy.role {
        if identity.role.as_deref() != Some(role.as_str()) {
            return Err(Error::Forbidden { role: role.clone() }.into());
        }
    }

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert("authorization", value.parse().unwrap());
        h
    }

    #[tokio::test]
    async fn static_verifier_resolves_known_tokens() {
        let verifier = StaticTokenVerifier::new().token("s3cret", "alice", Some("admin"));

        let identity = verifier.verify(&headers("Bearer s3cret")).await.unwrap();
        assert_eq!(identity.subject, "alice");
        assert_eq!(identity.role.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn static_verifier_rejects_unknown_and_malformed() {
        let verifier = StaticTokenVerifier::new().token("s3cret", "alice", None);

        assert!(verifier.verify(&headers("Bearer wrong")).await.is_none());
        assert!(verifier.verify(&headers("s3cret")).await.is_none());
        assert!(verifier.verify(&HeaderMap::new()).await.is_none());
    }

    #[test]
    fn verifier_debug_redacts_tokens() {
        let verifier = StaticTokenVerifier::new().token("s3cret", "alice", None);
        let debug = format!("{verifier:?}");
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("redacted"));
    }
}
