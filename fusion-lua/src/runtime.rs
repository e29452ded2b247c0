//! Pipeline script runtime
//!
//! Runs one pipeline script in a fresh sandbox and reports exactly one
//! [`CodeResult`] through a [`Completion`]:
//! - the script calls `complete(value, status)`, or
//! - the script returns normally: the host completes with `success` and the
//!   final `input`, or
//! - the script raises: the host stores the message in `input.error` and
//!   completes with `error`.
//!
//! The try/complete behavior lives here in the host; the user's source is
//! loaded as-is, never spliced into a template.

use fusion_core::domain::result::{CodeResult, CodeStatus};
use mlua::LuaSerdeExt;
use mlua::prelude::*;
use serde_json::Value as JsonValue;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::module::ModuleRegistry;
use crate::modules::{CompletionModule, LogModule, ScriptLogs};
use crate::sandbox::{CANCELLED_MESSAGE, create_sandbox, install_cancellation_hook};

/// Values injected into the sandbox besides the host modules
#[derive(Debug, Clone, Default)]
pub struct ScriptBindings {
    /// Identifies the script in logs (e.g. `pipeline:7`)
    pub label: String,
    /// Caller-supplied arguments, exposed as the 1-indexed `args` sequence.
    /// `args` stays nil when there are none.
    pub args: Vec<JsonValue>,
}

impl ScriptBindings {
    pub fn new(label: impl Into<String>, args: Vec<JsonValue>) -> Self {
        Self {
            label: label.into(),
            args,
        }
    }
}

/// One-shot delivery of a script's result
///
/// Whoever completes first (the script's `complete` call or the host after the
/// chunk ends) delivers the result; every later attempt is a no-op.
pub struct Completion {
    sender: Mutex<Option<oneshot::Sender<CodeResult>>>,
    logs: ScriptLogs,
}

impl Completion {
    pub fn new(logs: ScriptLogs) -> (Arc<Self>, oneshot::Receiver<CodeResult>) {
        let (tx, rx) = oneshot::channel();
        let completion = Arc::new(Self {
            sender: Mutex::new(Some(tx)),
            logs,
        });
        (completion, rx)
    }

    /// Delivers the result. Returns `false` if a result was already delivered.
    ///
    /// Log lines written up to this point are attached to the result.
    pub fn complete(&self, status: CodeStatus, output: JsonValue) -> bool {
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        match sender {
            Some(tx) => {
                let result = CodeResult {
                    status,
                    output,
                    logs: self.logs.snapshot(),
                };
                // The receiver may be gone after a timeout; nothing to do then.
                let _ = tx.send(result);
                true
            }
            None => false,
        }
    }

    pub fn is_completed(&self) -> bool {
        match self.sender.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }

    pub fn logs(&self) -> ScriptLogs {
        self.logs.clone()
    }

    pub fn label(&self) -> String {
        self.logs.label().to_string()
    }
}

/// Runs `source` to completion (or cancellation) on the current thread
///
/// Blocking: callers on an async runtime should move this onto a blocking
/// worker. `completion` always receives a result before this returns, unless
/// it already had one.
pub fn run_script(
    source: &str,
    bindings: &ScriptBindings,
    completion: Arc<Completion>,
    cancel: &CancellationToken,
) {
    let lua = match prepare_sandbox(bindings, completion.clone(), cancel) {
        Ok(lua) => lua,
        Err(e) => {
            tracing::error!(script = %bindings.label, "Failed to prepare sandbox: {}", e);
            completion.complete(
                CodeStatus::Error,
                JsonValue::String(format!("failed to prepare sandbox: {}", error_message(&e))),
            );
            return;
        }
    };

    tracing::debug!(script = %bindings.label, "Running script");
    let outcome = lua.load(source).set_name("pipeline").exec();

    if completion.is_completed() {
        if let Err(e) = outcome {
            tracing::debug!(
                script = %bindings.label,
                "Script failed after completing: {}",
                error_message(&e)
            );
        }
        return;
    }

    match outcome {
        Ok(()) => {
            let output = read_input(&lua).unwrap_or_else(|e| {
                JsonValue::String(format!("script input is not serializable: {}", e))
            });
            completion.complete(CodeStatus::Success, output);
        }
        Err(_) if cancel.is_cancelled() => {
            tracing::warn!(script = %bindings.label, "Script cancelled");
            completion.complete(
                CodeStatus::Error,
                JsonValue::String(CANCELLED_MESSAGE.to_string()),
            );
        }
        Err(e) => {
            let message = error_message(&e);
            tracing::warn!(script = %bindings.label, "Script raised: {}", message);
            let output = attach_error(&lua, &message)
                .unwrap_or_else(|_| serde_json::json!({ "error": message }));
            completion.complete(CodeStatus::Error, output);
        }
    }
}

/// Runs `source` synchronously and returns its result
pub fn execute(source: &str, bindings: &ScriptBindings) -> CodeResult {
    let (completion, mut rx) = Completion::new(ScriptLogs::new(bindings.label.clone()));
    run_script(source, bindings, completion, &CancellationToken::new());
    rx.try_recv().unwrap_or_else(|_| {
        CodeResult::error(JsonValue::String("script produced no result".to_string()))
    })
}

/// Compiles `source` in a sandbox without running it
pub fn check_syntax(source: &str) -> LuaResult<()> {
    let lua = create_sandbox()?;
    lua.load(source).set_name("pipeline").into_function()?;
    Ok(())
}

/// Human readable message of a Lua error, without the stack traceback
pub fn error_message(err: &LuaError) -> String {
    let message = match err {
        LuaError::RuntimeError(msg) => msg.clone(),
        LuaError::SyntaxError { message, .. } => message.clone(),
        LuaError::CallbackError { cause, .. } => return error_message(cause),
        other => other.to_string(),
    };
    match message.split_once("\nstack traceback:") {
        Some((head, _)) => head.to_string(),
        None => message,
    }
}

fn prepare_sandbox(
    bindings: &ScriptBindings,
    completion: Arc<Completion>,
    cancel: &CancellationToken,
) -> LuaResult<Lua> {
    let lua = create_sandbox()?;

    let mut registry = ModuleRegistry::new();
    registry.register(LogModule::new(completion.logs()))?;
    registry.register(CompletionModule::new(completion))?;
    registry.register_all(&lua)?;

    let globals = lua.globals();
    globals.set("input", lua.create_table()?)?;
    if !bindings.args.is_empty() {
        globals.set("args", lua.to_value(&bindings.args)?)?;
    }

    install_cancellation_hook(&lua, cancel.clone())?;
    Ok(lua)
}

fn read_input(lua: &Lua) -> LuaResult<JsonValue> {
    let input: LuaValue = lua.globals().get("input")?;
    lua.from_value(input)
}

fn attach_error(lua: &Lua, message: &str) -> LuaResult<JsonValue> {
    match lua.globals().get::<LuaValue>("input")? {
        LuaValue::Table(input) => {
            input.set("error", message)?;
            lua.from_value(LuaValue::Table(input))
        }
        _ => Ok(serde_json::json!({ "error": message })),
    }
}
