//! API Module
//!
//! Admin HTTP API of the side-effect dispatcher.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod isr;
pub mod pipeline;

use axum::{
    Router,
    routing::{get, post},
};
use fusion_events::{PipelineCatalog, RegenerationTrigger, ScriptDispatcher};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Services shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<PipelineCatalog>,
    pub dispatcher: Arc<ScriptDispatcher>,
    pub trigger: Arc<RegenerationTrigger>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Pipeline endpoints
        .route(
            "/api/admin/pipeline",
            get(pipeline::list_pipelines).post(pipeline::create_pipeline),
        )
        .route("/api/admin/pipeline/config", get(pipeline::pipeline_config))
        .route(
            "/api/admin/pipeline/{id}",
            get(pipeline::get_pipeline)
                .put(pipeline::update_pipeline)
                .delete(pipeline::delete_pipeline),
        )
        .route(
            "/api/admin/pipeline/trigger/{id}",
            post(pipeline::trigger_pipeline),
        )
        // ISR endpoints
        .route("/api/admin/isr", post(isr::trigger_all))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
