//! Read-only content queries used to enumerate regeneration paths

use async_trait::async_trait;
use fusion_core::domain::content::ArticleSummary;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("content query failed: {0}")]
pub struct ContentError(pub String);

/// Query side of the content store
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Articles, optionally including hidden and deleted ones
    async fn articles(
        &self,
        include_hidden: bool,
        include_deleted: bool,
    ) -> Result<Vec<ArticleSummary>, ContentError>;

    /// Number of non-deleted articles
    async fn total_articles(&self, include_hidden: bool) -> Result<u64, ContentError>;

    /// Names of every category
    async fn category_keys(&self) -> Result<Vec<String>, ContentError>;

    /// Tags used by articles
    async fn tags(&self, include_hidden: bool) -> Result<Vec<String>, ContentError>;
}
