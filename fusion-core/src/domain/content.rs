//! Content domain types
//!
//! Read-only projections of content owned by the document store. Only the
//! fields needed to derive regeneration paths are carried here.

use serde::{Deserialize, Serialize};

/// The subset of an article needed to compute its public path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSummary {
    pub id: i64,
    /// Human readable slug; preferred over the numeric id when present
    #[serde(default)]
    pub pathname: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl ArticleSummary {
    /// Path segment identifying this article under `/post/`
    pub fn slug(&self) -> String {
        match self.pathname.as_deref().map(str::trim) {
            Some(pathname) if !pathname.is_empty() => pathname.to_string(),
            _ => self.id.to_string(),
        }
    }

    /// Whether this article is publicly visible
    pub fn is_public(&self) -> bool {
        !self.hidden && !self.deleted
    }
}
