//! Script result domain types

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Outcome tag of a script execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeStatus {
    Success,
    Error,
}

impl CodeStatus {
    /// Parses the tag a script passed to its completion callback.
    ///
    /// Anything other than `"success"` is reported as an error.
    pub fn from_tag(tag: &str) -> Self {
        if tag.eq_ignore_ascii_case("success") {
            CodeStatus::Success
        } else {
            CodeStatus::Error
        }
    }
}

/// The outcome of one script execution
///
/// Exactly one is produced per dispatch, including the timeout case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeResult {
    pub status: CodeStatus,
    pub output: JsonValue,
    #[serde(default)]
    pub logs: Vec<String>,
}

impl CodeResult {
    pub const TIMEOUT_OUTPUT: &'static str = "timeout";

    pub fn success(output: JsonValue) -> Self {
        Self {
            status: CodeStatus::Success,
            output,
            logs: Vec::new(),
        }
    }

    pub fn error(output: JsonValue) -> Self {
        Self {
            status: CodeStatus::Error,
            output,
            logs: Vec::new(),
        }
    }

    /// Result synthesized when a script misses its time budget
    pub fn timeout() -> Self {
        Self::error(JsonValue::String(Self::TIMEOUT_OUTPUT.to_string()))
    }

    pub fn with_logs(mut self, logs: Vec<String>) -> Self {
        self.logs = logs;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == CodeStatus::Success
    }

    pub fn is_timeout(&self) -> bool {
        self.status == CodeStatus::Error
            && self.output.as_str() == Some(Self::TIMEOUT_OUTPUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_from_tag() {
        assert_eq!(CodeStatus::from_tag("success"), CodeStatus::Success);
        assert_eq!(CodeStatus::from_tag("error"), CodeStatus::Error);
        assert_eq!(CodeStatus::from_tag("whatever"), CodeStatus::Error);
    }

    #[test]
    fn test_timeout_result() {
        let result = CodeResult::timeout();
        assert!(result.is_timeout());
        assert!(!result.is_success());
        assert_eq!(result.output, json!("timeout"));
    }

    #[test]
    fn test_error_with_string_output_is_not_timeout() {
        assert!(!CodeResult::error(json!("boom")).is_timeout());
    }

    #[test]
    fn test_serialized_shape() {
        let result = CodeResult::success(json!({ "output": "Hello" }))
            .with_logs(vec!["[INFO] hi".to_string()]);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({ "status": "success", "output": { "output": "Hello" }, "logs": ["[INFO] hi"] })
        );
    }
}
