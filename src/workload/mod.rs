//! Placeholder workload served by each backend instance.
//!
//! # Endpoints
//! - `GET /health`: liveness with uptime
//! - `POST /process-image`: image pipeline placeholder
//! - `POST /generate-pdf`: document rendering placeholder
//! - `POST /heavy-computation`: CPU-bound placeholder
//! - anything else: endpoint index
//!
//! Malformed request bodies are answered locally with 400 and never reach the router.

pub mod handlers;

use std::time::Instant;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Shared state for the workload handlers.
#[derive(Debug, Clone)]
pub struct WorkloadState {
    pub started_at: Instant,
}

impl Default for WorkloadState {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }
}

/// Build the workload application.
pub fn app(state: WorkloadState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/process-image", post(handlers::process_image))
        .route("/generate-pdf", post(handlers::generate_pdf))
        .route("/heavy-computation", post(handlers::heavy_computation))
        .fallback(handlers::index)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
