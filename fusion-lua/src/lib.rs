//! Fusion Lua Infrastructure
//!
//! Sandboxed Lua execution for user-authored pipelines. It includes:
//! - A restricted sandbox with cooperative cancellation
//! - Host module trait and registry for injected bindings
//! - The `log` module with pluggable sinks
//! - The script runtime that seeds `input`/`args`, exposes `complete` and
//!   always reports exactly one `CodeResult`

pub mod module;
pub mod modules;
pub mod runtime;
pub mod sandbox;

pub use module::{HostModule, ModuleRegistry};
pub use modules::{CompletionModule, LogModule, LogSink, ScriptLogs};
pub use runtime::{Completion, ScriptBindings, check_syntax, execute, run_script};
pub use sandbox::{create_sandbox, install_cancellation_hook};
