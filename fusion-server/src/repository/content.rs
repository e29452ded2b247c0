//! Content queries backing the regeneration trigger

use async_trait::async_trait;
use fusion_core::domain::content::ArticleSummary;
use fusion_events::isr::{ContentError, ContentSource};
use sqlx::PgPool;

pub struct PgContentSource {
    pool: PgPool,
}

impl PgContentSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn query_failed(err: sqlx::Error) -> ContentError {
    ContentError(err.to_string())
}

#[async_trait]
impl ContentSource for PgContentSource {
    async fn articles(
        &self,
        include_hidden: bool,
        include_deleted: bool,
    ) -> Result<Vec<ArticleSummary>, ContentError> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT id, pathname, hidden, deleted
            FROM articles
            WHERE ($1 OR NOT hidden) AND ($2 OR NOT deleted)
            ORDER BY id
            "#,
        )
        .bind(include_hidden)
        .bind(include_deleted)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn total_articles(&self, include_hidden: bool) -> Result<u64, ContentError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM articles WHERE NOT deleted AND ($1 OR NOT hidden)",
        )
        .bind(include_hidden)
        .fetch_one(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(total.max(0) as u64)
    }

    async fn category_keys(&self) -> Result<Vec<String>, ContentError> {
        sqlx::query_scalar("SELECT name FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed)
    }

    async fn tags(&self, include_hidden: bool) -> Result<Vec<String>, ContentError> {
        sqlx::query_scalar(
            r#"
            SELECT DISTINCT tag
            FROM articles, unnest(tags) AS tag
            WHERE NOT deleted AND ($1 OR NOT hidden)
            ORDER BY tag
            "#,
        )
        .bind(include_hidden)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: i64,
    pathname: Option<String>,
    hidden: bool,
    deleted: bool,
}

impl From<ArticleRow> for ArticleSummary {
    fn from(row: ArticleRow) -> Self {
        ArticleSummary {
            id: row.id,
            pathname: row.pathname,
            hidden: row.hidden,
            deleted: row.deleted,
        }
    }
}
