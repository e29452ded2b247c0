//! Pipeline domain types

use serde::{Deserialize, Serialize};

use super::event::EventKey;

/// How a pipeline gets triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    #[default]
    System,
    Custom,
    Cron,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::System => "system",
            EventType::Custom => "custom",
            EventType::Cron => "cron",
        }
    }

    /// Only system and custom pipelines react to lifecycle events
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, EventType::System | EventType::Custom)
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(EventType::System),
            "custom" => Ok(EventType::Custom),
            "cron" => Ok(EventType::Cron),
            other => Err(format!("unknown event type '{}'", other)),
        }
    }
}

/// A persisted, user-authored automation script bound to one lifecycle event
///
/// Pipelines are never physically removed: deleting one sets `deleted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    pub id: i64,
    pub name: String,
    pub script: String,
    pub event_type: EventType,
    pub event_name: EventKey,
    pub enabled: bool,
    pub deleted: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Pipeline {
    /// Whether a lifecycle dispatch of `key` should run this pipeline
    pub fn is_dispatchable_for(&self, key: EventKey) -> bool {
        !self.deleted && self.enabled && self.event_type.is_lifecycle() && self.event_name == key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> Pipeline {
        let now = chrono::Utc::now();
        Pipeline {
            id: 1,
            name: "notify".to_string(),
            script: "complete(input)".to_string(),
            event_type: EventType::System,
            event_name: EventKey::AfterUpdateArticle,
            enabled: true,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_dispatchable_requires_matching_key() {
        let p = pipeline();
        assert!(p.is_dispatchable_for(EventKey::AfterUpdateArticle));
        assert!(!p.is_dispatchable_for(EventKey::Login));
    }

    #[test]
    fn test_disabled_deleted_and_cron_are_not_dispatchable() {
        let mut p = pipeline();
        p.enabled = false;
        assert!(!p.is_dispatchable_for(EventKey::AfterUpdateArticle));

        let mut p = pipeline();
        p.deleted = true;
        assert!(!p.is_dispatchable_for(EventKey::AfterUpdateArticle));

        let mut p = pipeline();
        p.event_type = EventType::Cron;
        assert!(!p.is_dispatchable_for(EventKey::AfterUpdateArticle));
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(pipeline()).unwrap();
        assert_eq!(json["eventName"], "afterUpdateArticle");
        assert_eq!(json["eventType"], "system");
        assert!(json.get("createdAt").is_some());
    }
}
