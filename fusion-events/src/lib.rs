//! Fusion side-effect dispatcher
//!
//! Reacts to content mutations of the publishing backend:
//! - [`isr`] regenerates the front-end pages a change affects
//! - [`catalog`] stores user-authored pipelines bound to lifecycle events
//! - [`dispatcher`] runs those pipelines in a time-bounded Lua sandbox
//! - [`effects`] is the single entry point content services call
//!
//! Both the trigger and the dispatcher return as soon as their work is
//! scheduled; failures are logged or reported as results, never raised to the
//! mutation that caused them.

pub mod bus;
pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod effects;
pub mod isr;

#[cfg(test)]
pub(crate) mod testing;

pub use bus::TopicBus;
pub use catalog::{CatalogError, InMemoryPipelineRepository, PipelineCatalog, PipelineRepository};
pub use config::{Config, ConfigError};
pub use dispatcher::{DispatchBatch, DispatchHandle, ScriptDispatcher};
pub use effects::{ContentEffects, Effects};
pub use isr::{ContentSource, HttpRevalidator, RegenerationTrigger, Revalidator, TriggerReport};
