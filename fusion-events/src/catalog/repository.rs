//! Storage seam of the pipeline catalog

use async_trait::async_trait;
use fusion_core::domain::event::EventKey;
use fusion_core::domain::pipeline::{EventType, Pipeline};

use super::error::Result;

/// A validated pipeline definition, ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDefinition {
    pub name: String,
    pub script: String,
    pub event_type: EventType,
    pub event_name: EventKey,
    pub enabled: bool,
}

/// Persistence of pipelines
///
/// Implementations assign ids that only ever grow and are never handed out
/// twice, even after a pipeline is deleted. Every read skips deleted rows.
#[async_trait]
pub trait PipelineRepository: Send + Sync {
    async fn insert(&self, definition: PipelineDefinition) -> Result<Pipeline>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Pipeline>>;

    /// Live pipelines, oldest first
    async fn list(&self) -> Result<Vec<Pipeline>>;

    /// Live pipelines bound to `key`, enabled or not
    async fn find_by_event(&self, key: EventKey) -> Result<Vec<Pipeline>>;

    /// Replaces the definition of a live pipeline and bumps `updated_at`.
    /// Returns `None` if there is no live pipeline with this id.
    async fn update(&self, id: i64, definition: PipelineDefinition) -> Result<Option<Pipeline>>;

    /// Flags a live pipeline as deleted. Returns `false` if there was none.
    async fn mark_deleted(&self, id: i64) -> Result<bool>;
}
