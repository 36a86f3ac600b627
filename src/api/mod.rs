//! HTTP surface
//!
//! Thin axum router over the queue and recording stores: enqueue, status
//! read, cancel-by-delete, the internal worker endpoint the queue loop
//! dispatches to, and the trim endpoints with their conflict mapping.

pub mod error;
pub mod models;
pub mod services;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use services::{
    cancel_download, cancel_trim, get_download, health, schedule_download, start_download,
    trim_recording,
};
use state::AppState;

/// Build the application router. Shared between the server and tests.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/downloads", post(schedule_download))
        .route(
            "/api/downloads/{meeting_id}",
            get(get_download).delete(cancel_download),
        )
        .route("/api/worker/start_download", post(start_download))
        .route("/api/recordings/trim", post(trim_recording))
        .route("/api/recordings/cancel-trim", post(cancel_trim))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
