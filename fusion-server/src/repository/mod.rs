//! Repository Layer
//!
//! Postgres implementations of the storage seams used by the dispatcher.

pub mod content;
pub mod pipeline;

pub use content::PgContentSource;
pub use pipeline::PgPipelineRepository;
