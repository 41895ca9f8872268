// SPDX-FileCopyrightText: 2026 Declarest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator maintenance surface: snapshot download and restore upload.
//!
//! Both routes are declared as custom routes so synthesis applies the same
//! auth policy as the rest of the gateway when one is configured.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json,
};
use serde_json::json;

use declarest_gateway::{ApiError, CustomRoute, RouteAuth};
use declarest_storage::Database;

/// Backup and restore routes bound to the live database.
pub fn routes(db: Database, auth: RouteAuth) -> Vec<CustomRoute> {
    vec![
        CustomRoute::new(
            "/api/system/backup",
            get(download_backup).with_state(db.clone()),
        )
        .auth(auth_clone(&auth)),
        CustomRoute::new(
            "/api/system/restore",
            post(upload_restore).with_state(db),
        )
        .auth(auth),
    ]
}

fn auth_clone(auth: &RouteAuth) -> RouteAuth {
    match auth {
        RouteAuth::Inherit => RouteAuth::Inherit,
        RouteAuth::Public => RouteAuth::Public,
        RouteAuth::Require(policy) => RouteAuth::Require(policy.clone()),
    }
}

/// `GET /api/system/backup`: a point-in-time snapshot of the whole engine,
/// served as a downloadable SQLite file.
async fn download_backup(State(db): State<Database>) -> Result<impl IntoResponse, ApiError> {
    let bytes = db.backup().await?;
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"declarest-{stamp}.db\""),
            ),
        ],
        bytes,
    ))
}

/// `POST /api/system/restore`: replace the engine state with an uploaded
/// snapshot. Corrupt uploads are rejected without touching the live file.
async fn upload_restore(
    State(db): State<Database>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if body.is_empty() {
        return Err(ApiError::bad_request("empty snapshot upload"));
    }
    db.restore(body.to_vec()).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "ok": true, "message": "snapshot restored" })),
    ))
}
