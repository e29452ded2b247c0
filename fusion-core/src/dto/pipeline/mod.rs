//! Pipeline DTOs

use serde::{Deserialize, Serialize};

use crate::domain::pipeline::EventType;

fn default_enabled() -> bool {
    true
}

/// Request to create or replace a pipeline
///
/// `event_name` stays a string so that an unknown event is reported as a
/// validation error by the catalog instead of a deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePipeline {
    pub name: String,
    pub script: String,
    #[serde(default)]
    pub event_type: EventType,
    pub event_name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Updates carry the full pipeline definition
pub type UpdatePipeline = CreatePipeline;

/// Body of a manual pipeline trigger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerPipeline {
    #[serde(default)]
    pub input: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_pipeline_defaults() {
        let req: CreatePipeline = serde_json::from_str(
            r#"{ "name": "n", "script": "s", "eventName": "login" }"#,
        )
        .unwrap();
        assert!(req.enabled);
        assert_eq!(req.event_type, EventType::System);
        assert_eq!(req.event_name, "login");
    }

    #[test]
    fn test_create_pipeline_accepts_unknown_event_name() {
        let req: CreatePipeline = serde_json::from_str(
            r#"{ "name": "n", "script": "s", "eventName": "nope", "enabled": false }"#,
        )
        .unwrap();
        assert_eq!(req.event_name, "nope");
        assert!(!req.enabled);
    }
}
