//! HTTP inbound adapter.
//!
//! Serves the published manifests, the segment bytes they reference, and the
//! processor status to players and operators.

mod handlers;

use crate::application::publisher::PlaylistPublisher;
use crate::application::settings::SettingsHandle;
use crate::application::stats::ProcessingStats;
use crate::ports::executor::PipelineExecutor;
use crate::ports::storage::ArtifactStore;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Everything the handlers read. Handlers never mutate pipeline state.
#[derive(Clone)]
pub struct AppState {
    pub publisher: Arc<PlaylistPublisher>,
    pub store: Arc<dyn ArtifactStore>,
    pub stats: Arc<ProcessingStats>,
    pub executor: Arc<dyn PipelineExecutor>,
    pub settings: SettingsHandle,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::player))
        .route("/health", get(handlers::health))
        .route("/api/stream", get(handlers::stream_manifest))
        .route("/api/segments/:file", get(handlers::transformed_segment))
        .route("/api/raw", get(handlers::raw_manifest))
        .route("/api/raw-segments/:file", get(handlers::raw_segment))
        .route("/api/status", get(handlers::status))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
