//! Core domain types
//!
//! These types are shared between the catalog (persists pipelines), the
//! dispatcher (executes them) and the regeneration trigger (reads content).

pub mod content;
pub mod event;
pub mod log;
pub mod pipeline;
pub mod result;
