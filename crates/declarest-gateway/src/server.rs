// SPDX-FileCopyrightText: 2026 Declarest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP server bootstrap: bind and serve a synthesized router.

use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use declarest_core::Error;

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Unauthenticated liveness route.
pub fn health_router() -> Router {
    Router::new().route("/health", get(get_health))
}

async fn get_health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Bind the configured address and serve `app` until the process exits.
pub async fn start_server(config: &ServerConfig, app: Router) -> Result<(), Error> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Gateway {
            message: format!("failed to bind to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::Gateway {
            message: format!("server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_debug() {
        let config = ServerConfig::default();
        let debug = format!("{config:?}");
        assert!(debug.contains("127.0.0.1"));
    }
}
