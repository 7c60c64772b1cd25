//! HTTP/WS route wiring.

pub mod assets;
pub mod ws;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the relay router: the room WebSocket plus the asset side-channel.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/ws", get(ws::handle_ws))
        .route("/api/assets", post(assets::upload))
        .route("/api/assets/{node}", get(assets::fetch))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
