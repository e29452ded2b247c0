//! Host modules injected into every pipeline sandbox
//!
//! - `log`: diagnostics collected into the script's result
//! - `complete`: the completion callback

pub mod completion;
pub mod log;

pub use completion::CompletionModule;
pub use log::{LogModule, LogSink, ScriptLogs};
