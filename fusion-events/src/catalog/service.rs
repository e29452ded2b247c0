//! Pipeline Service
//!
//! Validation and lookup on top of a [`PipelineRepository`].

use fusion_core::domain::event::{EventItem, EventKey, system_events};
use fusion_core::domain::pipeline::Pipeline;
use fusion_core::dto::pipeline::{CreatePipeline, UpdatePipeline};
use std::sync::Arc;

use super::error::{CatalogError, Result};
use super::repository::{PipelineDefinition, PipelineRepository};

const MAX_NAME_LEN: usize = 255;

pub struct PipelineCatalog {
    repository: Arc<dyn PipelineRepository>,
}

impl PipelineCatalog {
    pub fn new(repository: Arc<dyn PipelineRepository>) -> Self {
        Self { repository }
    }

    /// Every lifecycle event a pipeline can bind to
    pub fn system_events(&self) -> Vec<EventItem> {
        system_events()
    }

    /// Live pipelines
    pub async fn get_all(&self) -> Result<Vec<Pipeline>> {
        self.repository.list().await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Pipeline> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(CatalogError::NotFound(id))
    }

    /// Live pipelines bound to `key`
    ///
    /// Disabled pipelines are included; the dispatcher skips them.
    pub async fn get_by_event_key(&self, key: EventKey) -> Result<Vec<Pipeline>> {
        self.repository.find_by_event(key).await
    }

    /// Create a new pipeline
    ///
    /// Nothing is written when validation fails.
    pub async fn create(&self, req: CreatePipeline) -> Result<Pipeline> {
        let definition = validate_pipeline_request(req)?;
        let pipeline = self.repository.insert(definition).await?;

        tracing::info!(
            pipeline_id = pipeline.id,
            event = %pipeline.event_name,
            "Pipeline created: {}",
            pipeline.name
        );
        Ok(pipeline)
    }

    /// Replace a pipeline's definition
    pub async fn update(&self, id: i64, req: UpdatePipeline) -> Result<Pipeline> {
        let definition = validate_pipeline_request(req)?;
        let pipeline = self
            .repository
            .update(id, definition)
            .await?
            .ok_or(CatalogError::NotFound(id))?;

        tracing::info!(pipeline_id = id, "Pipeline updated: {}", pipeline.name);
        Ok(pipeline)
    }

    /// Logical delete
    pub async fn delete(&self, id: i64) -> Result<()> {
        if !self.repository.mark_deleted(id).await? {
            return Err(CatalogError::NotFound(id));
        }

        tracing::info!(pipeline_id = id, "Pipeline deleted");
        Ok(())
    }
}

// =============================================================================
// Validation
// =============================================================================

fn validate_pipeline_request(req: CreatePipeline) -> Result<PipelineDefinition> {
    let event_name: EventKey = req
        .event_name
        .parse()
        .map_err(|e| CatalogError::Validation(format!("{}", e)))?;

    if req.name.trim().is_empty() {
        return Err(CatalogError::Validation(
            "Pipeline name cannot be empty".to_string(),
        ));
    }

    if req.name.chars().count() > MAX_NAME_LEN {
        return Err(CatalogError::Validation(format!(
            "Pipeline name is too long (max {} characters)",
            MAX_NAME_LEN
        )));
    }

    if req.script.trim().is_empty() {
        return Err(CatalogError::Validation(
            "Pipeline script cannot be empty".to_string(),
        ));
    }

    // Compile only; the script must not run here
    if let Err(e) = fusion_lua::check_syntax(&req.script) {
        return Err(CatalogError::Validation(format!(
            "Invalid Lua script: {}",
            fusion_lua::runtime::error_message(&e)
        )));
    }

    Ok(PipelineDefinition {
        name: req.name,
        script: req.script,
        event_type: req.event_type,
        event_name,
        enabled: req.enabled,
    })
}
