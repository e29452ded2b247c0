//! Catalog error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// No live pipeline with this id
    #[error("pipeline {0} not found")]
    NotFound(i64),

    /// The request was rejected before anything was written
    #[error("invalid pipeline: {0}")]
    Validation(String),

    /// The backing store failed
    #[error("pipeline storage error: {0}")]
    Storage(String),
}

impl CatalogError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
