//! Pipeline Repository
//!
//! Postgres storage of pipelines. Rows are never removed; deletion flips
//! `deleted`.

use async_trait::async_trait;
use fusion_core::domain::event::EventKey;
use fusion_core::domain::pipeline::{EventType, Pipeline};
use fusion_events::catalog::{CatalogError, PipelineDefinition, PipelineRepository, Result};
use sqlx::PgPool;

const COLUMNS: &str =
    "id, name, script, event_type, event_name, enabled, deleted, created_at, updated_at";

pub struct PgPipelineRepository {
    pool: PgPool,
}

impl PgPipelineRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn storage(err: sqlx::Error) -> CatalogError {
    tracing::error!("Database error: {:?}", err);
    CatalogError::Storage(err.to_string())
}

#[async_trait]
impl PipelineRepository for PgPipelineRepository {
    async fn insert(&self, definition: PipelineDefinition) -> Result<Pipeline> {
        let now = chrono::Utc::now();

        let row = sqlx::query_as::<_, PipelineRow>(&format!(
            r#"
            INSERT INTO pipelines (
                name, script, event_type, event_name, enabled, deleted, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, FALSE, $6, $6)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&definition.name)
        .bind(&definition.script)
        .bind(definition.event_type.as_str())
        .bind(definition.event_name.as_str())
        .bind(definition.enabled)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        row.try_into()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Pipeline>> {
        let row = sqlx::query_as::<_, PipelineRow>(&format!(
            "SELECT {COLUMNS} FROM pipelines WHERE id = $1 AND NOT deleted"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.map(Pipeline::try_from).transpose()
    }

    async fn list(&self) -> Result<Vec<Pipeline>> {
        let rows = sqlx::query_as::<_, PipelineRow>(&format!(
            "SELECT {COLUMNS} FROM pipelines WHERE NOT deleted ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.into_iter().map(Pipeline::try_from).collect()
    }

    async fn find_by_event(&self, key: EventKey) -> Result<Vec<Pipeline>> {
        let rows = sqlx::query_as::<_, PipelineRow>(&format!(
            "SELECT {COLUMNS} FROM pipelines WHERE event_name = $1 AND NOT deleted ORDER BY id"
        ))
        .bind(key.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.into_iter().map(Pipeline::try_from).collect()
    }

    async fn update(&self, id: i64, definition: PipelineDefinition) -> Result<Option<Pipeline>> {
        let row = sqlx::query_as::<_, PipelineRow>(&format!(
            r#"
            UPDATE pipelines
            SET name = $1, script = $2, event_type = $3, event_name = $4, enabled = $5,
                updated_at = $6
            WHERE id = $7 AND NOT deleted
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&definition.name)
        .bind(&definition.script)
        .bind(definition.event_type.as_str())
        .bind(definition.event_name.as_str())
        .bind(definition.enabled)
        .bind(chrono::Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.map(Pipeline::try_from).transpose()
    }

    async fn mark_deleted(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE pipelines SET deleted = TRUE, updated_at = $1 WHERE id = $2 AND NOT deleted",
        )
        .bind(chrono::Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct PipelineRow {
    id: i64,
    name: String,
    script: String,
    event_type: String,
    event_name: String,
    enabled: bool,
    deleted: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<PipelineRow> for Pipeline {
    type Error = CatalogError;

    fn try_from(row: PipelineRow) -> Result<Self> {
        let event_type: EventType = row
            .event_type
            .parse()
            .map_err(|e| CatalogError::Storage(format!("pipeline {}: {}", row.id, e)))?;
        let event_name: EventKey = row
            .event_name
            .parse()
            .map_err(|e| CatalogError::Storage(format!("pipeline {}: {}", row.id, e)))?;

        Ok(Pipeline {
            id: row.id,
            name: row.name,
            script: row.script,
            event_type,
            event_name,
            enabled: row.enabled,
            deleted: row.deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(event_type: &str, event_name: &str) -> PipelineRow {
        let now = chrono::Utc::now();
        PipelineRow {
            id: 7,
            name: "notify".to_string(),
            script: "complete(input)".to_string(),
            event_type: event_type.to_string(),
            event_name: event_name.to_string(),
            enabled: true,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_conversion() {
        let pipeline = Pipeline::try_from(row("custom", "afterUpdateDraft")).unwrap();
        assert_eq!(pipeline.id, 7);
        assert_eq!(pipeline.event_type, EventType::Custom);
        assert_eq!(pipeline.event_name, EventKey::AfterUpdateDraft);
    }

    #[test]
    fn test_corrupt_row_is_a_storage_error() {
        let err = Pipeline::try_from(row("system", "legacyEvent")).unwrap_err();
        assert!(matches!(err, CatalogError::Storage(_)));
    }
}
