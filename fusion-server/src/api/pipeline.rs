//! Pipeline API Handlers
//!
//! Admin endpoints for the pipeline catalog and manual triggers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use fusion_core::domain::event::EventItem;
use fusion_core::domain::pipeline::Pipeline;
use fusion_core::dto::pipeline::{CreatePipeline, TriggerPipeline, UpdatePipeline};

use crate::api::AppState;
use crate::api::error::ApiResult;

/// GET /api/admin/pipeline
pub async fn list_pipelines(State(state): State<AppState>) -> ApiResult<Json<Vec<Pipeline>>> {
    tracing::debug!("Listing all pipelines");
    Ok(Json(state.catalog.get_all().await?))
}

/// GET /api/admin/pipeline/config
/// Lifecycle events a pipeline can bind to
pub async fn pipeline_config(State(state): State<AppState>) -> Json<Vec<EventItem>> {
    Json(state.catalog.system_events())
}

/// GET /api/admin/pipeline/{id}
pub async fn get_pipeline(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Pipeline>> {
    tracing::debug!("Getting pipeline: {}", id);
    Ok(Json(state.catalog.get_by_id(id).await?))
}

/// POST /api/admin/pipeline
pub async fn create_pipeline(
    State(state): State<AppState>,
    Json(req): Json<CreatePipeline>,
) -> ApiResult<Json<Pipeline>> {
    tracing::info!("Creating pipeline: {}", req.name);
    Ok(Json(state.catalog.create(req).await?))
}

/// PUT /api/admin/pipeline/{id}
pub async fn update_pipeline(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePipeline>,
) -> ApiResult<Json<Pipeline>> {
    tracing::info!("Updating pipeline: {}", id);
    Ok(Json(state.catalog.update(id, req).await?))
}

/// DELETE /api/admin/pipeline/{id}
/// Logical delete
pub async fn delete_pipeline(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting pipeline: {}", id);
    state.catalog.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/admin/pipeline/trigger/{id}
/// Runs one pipeline in the background with the optional `input` as its
/// single argument; does not wait for the result
pub async fn trigger_pipeline(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Option<Json<TriggerPipeline>>,
) -> ApiResult<Json<bool>> {
    let args = body
        .and_then(|Json(req)| req.input)
        .into_iter()
        .collect::<Vec<_>>();

    // Enabled or not; lookup errors keep their own status
    let pipeline = state.catalog.get_by_id(id).await?;
    let handle = state.dispatcher.dispatch(&pipeline, args);

    tracing::info!(
        pipeline_id = id,
        dispatch_id = %handle.dispatch_id(),
        "Pipeline triggered manually"
    );
    Ok(Json(true))
}
