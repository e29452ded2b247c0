//! In-memory pipeline repository
//!
//! Used by tests and by embedders that do not need durable pipelines.

use async_trait::async_trait;
use chrono::Utc;
use fusion_core::domain::event::EventKey;
use fusion_core::domain::pipeline::Pipeline;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use super::error::Result;
use super::repository::{PipelineDefinition, PipelineRepository};

pub struct InMemoryPipelineRepository {
    next_id: AtomicI64,
    rows: RwLock<BTreeMap<i64, Pipeline>>,
}

impl InMemoryPipelineRepository {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            rows: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of stored rows, deleted ones included
    pub async fn stored(&self) -> usize {
        self.rows.read().await.len()
    }
}

impl Default for InMemoryPipelineRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineRepository for InMemoryPipelineRepository {
    async fn insert(&self, definition: PipelineDefinition) -> Result<Pipeline> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let pipeline = Pipeline {
            id,
            name: definition.name,
            script: definition.script,
            event_type: definition.event_type,
            event_name: definition.event_name,
            enabled: definition.enabled,
            deleted: false,
            created_at: now,
            updated_at: now,
        };

        self.rows.write().await.insert(id, pipeline.clone());
        Ok(pipeline)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Pipeline>> {
        Ok(self
            .rows
            .read()
            .await
            .get(&id)
            .filter(|p| !p.deleted)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Pipeline>> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|p| !p.deleted)
            .cloned()
            .collect())
    }

    async fn find_by_event(&self, key: EventKey) -> Result<Vec<Pipeline>> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|p| !p.deleted && p.event_name == key)
            .cloned()
            .collect())
    }

    async fn update(&self, id: i64, definition: PipelineDefinition) -> Result<Option<Pipeline>> {
        let mut rows = self.rows.write().await;
        let Some(pipeline) = rows.get_mut(&id).filter(|p| !p.deleted) else {
            return Ok(None);
        };

        pipeline.name = definition.name;
        pipeline.script = definition.script;
        pipeline.event_type = definition.event_type;
        pipeline.event_name = definition.event_name;
        pipeline.enabled = definition.enabled;
        pipeline.updated_at = Utc::now();
        Ok(Some(pipeline.clone()))
    }

    async fn mark_deleted(&self, id: i64) -> Result<bool> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&id).filter(|p| !p.deleted) {
            Some(pipeline) => {
                pipeline.deleted = true;
                pipeline.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
