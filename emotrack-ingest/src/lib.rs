//! emotrack-ingest library - real-time emotion frame ingestion
//!
//! Accepts one authenticated video stream per identity over a WebSocket,
//! classifies each frame, batches the resulting samples into SQLite and
//! builds a trend summary and report when the stream ends.

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod aggregator;
pub mod api;
pub mod buffer;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod inference;
pub mod protocol;
pub mod registry;
pub mod report;
pub mod session;

pub use error::{Error, Result};
pub use session::SessionServices;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub services: SessionServices,
}

impl AppState {
    pub fn new(services: SessionServices) -> Self {
        Self { services }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route("/ws/video", get(api::video_stream))
        .route("/events", get(api::event_stream))
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
