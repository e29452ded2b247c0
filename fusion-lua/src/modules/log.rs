//! Logging module for pipeline scripts
//!
//! Scripts write diagnostics through `log.debug/info/warning/error(msg)`;
//! `print(...)` is rerouted to the info level so nothing reaches the process
//! stdout. Where the lines end up is decided by the [`LogSink`].

use crate::module::HostModule;
use fusion_core::domain::log::LogLevel;
use mlua::prelude::*;
use std::sync::{Arc, Mutex};

/// Destination of script log lines
///
/// # Thread Safety
/// Implementations must be Send + Sync to work with Lua's threading model.
pub trait LogSink: Send + Sync {
    fn write(&mut self, level: LogLevel, message: &str);
}

/// `log` module, generic over where the lines go
pub struct LogModule<S: LogSink> {
    sink: Arc<Mutex<S>>,
}

impl<S: LogSink> LogModule<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }
}

fn write_to<S: LogSink>(sink: &Mutex<S>, level: LogLevel, message: &str) -> LuaResult<()> {
    sink.lock()
        .map_err(|e| LuaError::RuntimeError(format!("Failed to lock sink: {}", e)))?
        .write(level, message);
    Ok(())
}

impl<S: LogSink + 'static> HostModule for LogModule<S> {
    fn id(&self) -> &'static str {
        "log"
    }

    fn register(&self, lua: &Lua) -> LuaResult<()> {
        let log_table = lua.create_table()?;

        for (name, level) in [
            ("debug", LogLevel::Debug),
            ("info", LogLevel::Info),
            ("warning", LogLevel::Warning),
            ("error", LogLevel::Error),
        ] {
            let sink = self.sink.clone();
            log_table.set(
                name,
                lua.create_function(move |_, msg: String| write_to(&sink, level, &msg))?,
            )?;
        }

        // print(...) joins its arguments like the stock implementation
        {
            let sink = self.sink.clone();
            lua.globals().set(
                "print",
                lua.create_function(move |_, args: LuaMultiValue| {
                    let parts = args
                        .iter()
                        .map(|v| v.to_string())
                        .collect::<LuaResult<Vec<String>>>()?;
                    write_to(&sink, LogLevel::Info, &parts.join("\t"))
                })?,
            )?;
        }

        lua.globals().set(self.id(), log_table)?;
        Ok(())
    }
}

/// Sink that keeps the lines for the script's `CodeResult` and mirrors them
/// to `tracing`
#[derive(Clone, Default)]
pub struct ScriptLogs {
    label: String,
    lines: Arc<Mutex<Vec<String>>>,
}

impl ScriptLogs {
    /// `label` identifies the script in the mirrored tracing events
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            lines: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Lines written so far, in order
    pub fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl LogSink for ScriptLogs {
    fn write(&mut self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(script = %self.label, "{}", message),
            LogLevel::Info => tracing::info!(script = %self.label, "{}", message),
            LogLevel::Warning => tracing::warn!(script = %self.label, "{}", message),
            LogLevel::Error => tracing::error!(script = %self.label, "{}", message),
        }

        let line = format!("[{}] {}", level, message);
        match self.lines.lock() {
            Ok(mut lines) => lines.push(line),
            Err(poisoned) => poisoned.into_inner().push(line),
        }
    }
}
