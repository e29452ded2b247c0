//! Completion callback for pipeline scripts
//!
//! `complete(value, status)` reports the script's outcome. `status` is
//! `"success"` when omitted; any tag other than `"success"` is an error.
//! Only the first call counts.

use crate::module::HostModule;
use crate::runtime::Completion;
use fusion_core::domain::result::CodeStatus;
use mlua::LuaSerdeExt;
use mlua::prelude::*;
use serde_json::Value as JsonValue;
use std::sync::Arc;

pub struct CompletionModule {
    completion: Arc<Completion>,
}

impl CompletionModule {
    pub fn new(completion: Arc<Completion>) -> Self {
        Self { completion }
    }
}

impl HostModule for CompletionModule {
    fn id(&self) -> &'static str {
        "complete"
    }

    fn register(&self, lua: &Lua) -> LuaResult<()> {
        let completion = self.completion.clone();
        let complete = lua.create_function(
            move |lua, (value, status): (LuaValue, Option<String>)| {
                let status = status
                    .as_deref()
                    .map(CodeStatus::from_tag)
                    .unwrap_or(CodeStatus::Success);

                let (status, output) = match lua.from_value::<JsonValue>(value) {
                    Ok(output) => (status, output),
                    Err(e) => (
                        CodeStatus::Error,
                        JsonValue::String(format!("script output is not serializable: {}", e)),
                    ),
                };

                if !completion.complete(status, output) {
                    tracing::warn!(
                        script = %completion.label(),
                        "complete() called after the script already completed; ignoring"
                    );
                }
                Ok(())
            },
        )?;

        lua.globals().set(self.id(), complete)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::ScriptLogs;
    use serde_json::json;

    fn setup() -> (
        Lua,
        Arc<Completion>,
        tokio::sync::oneshot::Receiver<fusion_core::domain::result::CodeResult>,
    ) {
        let (completion, rx) = Completion::new(ScriptLogs::new("test"));
        let lua = Lua::new();
        CompletionModule::new(completion.clone())
            .register(&lua)
            .unwrap();
        (lua, completion, rx)
    }

    #[test]
    fn test_complete_defaults_to_success() {
        let (lua, completion, mut rx) = setup();

        lua.load(r#"complete({ answer = 42 })"#).exec().unwrap();

        assert!(completion.is_completed());
        let result = rx.try_recv().unwrap();
        assert_eq!(result.status, CodeStatus::Success);
        assert_eq!(result.output, json!({ "answer": 42 }));
    }

    #[test]
    fn test_first_completion_wins() {
        let (lua, _completion, mut rx) = setup();

        lua.load(r#"complete("first", "error") complete("second", "success")"#)
            .exec()
            .unwrap();

        let result = rx.try_recv().unwrap();
        assert_eq!(result.status, CodeStatus::Error);
        assert_eq!(result.output, json!("first"));
    }

    #[test]
    fn test_unserializable_output_is_an_error() {
        let (lua, _completion, mut rx) = setup();

        lua.load(r#"complete({ f = function() end })"#)
            .exec()
            .unwrap();

        let result = rx.try_recv().unwrap();
        assert_eq!(result.status, CodeStatus::Error);
        assert!(
            result
                .output
                .as_str()
                .unwrap()
                .contains("not serializable")
        );
    }
}
