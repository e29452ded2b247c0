//! Pipeline catalog
//!
//! Stores user-authored pipelines and answers event-keyed lookups. Pipelines
//! are never physically removed; deletion only flips the `deleted` flag.

pub mod error;
pub mod memory;
pub mod repository;
pub mod service;

pub use error::{CatalogError, Result};
pub use memory::InMemoryPipelineRepository;
pub use repository::{PipelineDefinition, PipelineRepository};
pub use service::PipelineCatalog;
