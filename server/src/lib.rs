//! Eight-ball pool room server library.
//!
//! This module exposes the server components for use in tests and binaries.

pub mod config;
pub mod game_loop;
pub mod room;
pub mod rooms;
pub mod ws;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::ws::{create_room, ws_handler, AppState};

/// HTTP surface: `POST /rooms` and `GET /ws/{room_id}?id=..&secret=..`
pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/ws/{room_id}", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
