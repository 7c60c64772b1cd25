//! Asset routes — the binary side-channel for image objects.
//!
//! DESIGN
//! ======
//! Upload success and "the object is visible to all clients" are coupled:
//! the handler stores the bytes, registers the image object, broadcasts
//! `addImage` to room members on the project, and only then responds. There
//! is no intermediate protocol state for an upload in flight.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use events::ServerEvent;

use crate::services;
use crate::state::{AppState, StoredAsset};

/// Metadata accompanying an upload. Position and size are where the image
/// box lands on the canvas.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadParams {
    pub team_id: Uuid,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub file_name: String,
    /// Echoed in the `addImage` broadcast so the uploader can resolve its
    /// optimistic placeholder.
    pub correlation: Option<Uuid>,
}

/// `POST /api/assets` — store bytes, register the object, broadcast, reply.
pub async fn upload(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if body.is_empty() {
        return (StatusCode::BAD_REQUEST, "empty body").into_response();
    }
    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_owned();

    let object = match services::object::create_image(
        &state,
        params.team_id,
        params.project_id,
        params.user_id,
        (params.x, params.y),
        (params.width, params.height),
        &params.file_name,
        &mime_type,
    )
    .await
    {
        Ok(object) => object,
        Err(e) => {
            warn!(error = %e, "asset upload rejected");
            return (StatusCode::NOT_FOUND, e.to_string()).into_response();
        }
    };

    let node = object.base.node;
    state.assets.write().await.insert(node, StoredAsset { mime_type, bytes: body });
    info!(%node, project_id = %params.project_id, file = %params.file_name, "asset stored");

    let event = ServerEvent::AddImage { object, correlation: params.correlation };
    services::room::broadcast_project(&state, params.team_id, params.project_id, &event, None)
        .await;

    (
        StatusCode::OK,
        axum::Json(json!({
            "node": node,
            "projectId": params.project_id,
            "teamId": params.team_id,
        })),
    )
        .into_response()
}

/// `GET /api/assets/{node}` — serve stored bytes.
pub async fn fetch(State(state): State<AppState>, Path(node): Path<Uuid>) -> Response {
    let assets = state.assets.read().await;
    let Some(asset) = assets.get(&node) else {
        return (StatusCode::NOT_FOUND, "no such asset").into_response();
    };
    ([(header::CONTENT_TYPE, asset.mime_type.clone())], asset.bytes.clone()).into_response()
}

#[cfg(test)]
#[path = "assets_test.rs"]
mod tests;
