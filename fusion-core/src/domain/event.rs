//! Lifecycle event domain types
//!
//! The closed set of system lifecycle points a pipeline can be bound to.
//! Adding a variant forces every exhaustive `match` below (and every dispatch
//! site matching on `EventKey`) to be updated.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A system lifecycle event a pipeline can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKey {
    #[serde(rename = "login")]
    Login,
    #[serde(rename = "logout")]
    Logout,
    #[serde(rename = "beforeUpdateArticle")]
    BeforeUpdateArticle,
    #[serde(rename = "afterUpdateArticle")]
    AfterUpdateArticle,
    #[serde(rename = "deleteArticle")]
    DeleteArticle,
    #[serde(rename = "beforeUpdateDraft")]
    BeforeUpdateDraft,
    #[serde(rename = "afterUpdateDraft")]
    AfterUpdateDraft,
    #[serde(rename = "deleteDraft")]
    DeleteDraft,
    #[serde(rename = "updateSiteInfo")]
    UpdateSiteInfo,
    #[serde(rename = "manualTriggerEvent")]
    ManualTrigger,
}

impl EventKey {
    /// Every lifecycle event, in the order the admin UI lists them
    pub const ALL: [EventKey; 10] = [
        EventKey::Login,
        EventKey::Logout,
        EventKey::BeforeUpdateArticle,
        EventKey::AfterUpdateArticle,
        EventKey::DeleteArticle,
        EventKey::BeforeUpdateDraft,
        EventKey::AfterUpdateDraft,
        EventKey::DeleteDraft,
        EventKey::UpdateSiteInfo,
        EventKey::ManualTrigger,
    ];

    /// Wire name, as persisted in `eventName`
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKey::Login => "login",
            EventKey::Logout => "logout",
            EventKey::BeforeUpdateArticle => "beforeUpdateArticle",
            EventKey::AfterUpdateArticle => "afterUpdateArticle",
            EventKey::DeleteArticle => "deleteArticle",
            EventKey::BeforeUpdateDraft => "beforeUpdateDraft",
            EventKey::AfterUpdateDraft => "afterUpdateDraft",
            EventKey::DeleteDraft => "deleteDraft",
            EventKey::UpdateSiteInfo => "updateSiteInfo",
            EventKey::ManualTrigger => "manualTriggerEvent",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EventKey::Login => "Login",
            EventKey::Logout => "Logout",
            EventKey::BeforeUpdateArticle => "Before article update",
            EventKey::AfterUpdateArticle => "After article update",
            EventKey::DeleteArticle => "Delete article",
            EventKey::BeforeUpdateDraft => "Before draft update",
            EventKey::AfterUpdateDraft => "After draft update",
            EventKey::DeleteDraft => "Delete draft",
            EventKey::UpdateSiteInfo => "Update site info",
            EventKey::ManualTrigger => "Manual trigger",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            EventKey::Login => "A user logged in",
            EventKey::Logout => "A user logged out",
            EventKey::BeforeUpdateArticle => {
                "Before an article is published, saved, created or has its info updated; \
                 the script output may replace the article data that gets stored"
            }
            EventKey::AfterUpdateArticle => {
                "After an article is published, saved, created or has its info updated"
            }
            EventKey::DeleteArticle => "An article was deleted",
            EventKey::BeforeUpdateDraft => {
                "Before a draft is saved, created or has its info updated; \
                 the script output may replace the draft content that gets stored"
            }
            EventKey::AfterUpdateDraft => "After a draft is saved, created or has its info updated",
            EventKey::DeleteDraft => "A draft was deleted",
            EventKey::UpdateSiteInfo => "Site information was updated",
            EventKey::ManualTrigger => "Triggered by hand from the admin console",
        }
    }

    /// Passive events are notifications only: handlers cannot alter the
    /// in-flight payload. Non-passive events run before the mutation is stored.
    pub fn passive(&self) -> bool {
        !matches!(
            self,
            EventKey::BeforeUpdateArticle | EventKey::BeforeUpdateDraft
        )
    }

    pub fn item(&self) -> EventItem {
        EventItem {
            event_name: *self,
            label: self.label(),
            description: self.description(),
            passive: self.passive(),
        }
    }
}

impl std::fmt::Display for EventKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known lifecycle event
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("the event '{0}' is not a supported system event")]
pub struct UnknownEventKey(pub String);

impl FromStr for EventKey {
    type Err = UnknownEventKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| UnknownEventKey(s.to_string()))
    }
}

/// Descriptor of a lifecycle event, served to the admin console
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventItem {
    pub event_name: EventKey,
    pub label: &'static str,
    pub description: &'static str,
    pub passive: bool,
}

/// All system events with their descriptors
pub fn system_events() -> Vec<EventItem> {
    EventKey::ALL.iter().map(EventKey::item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_every_key() {
        for key in EventKey::ALL {
            assert_eq!(key.as_str().parse::<EventKey>(), Ok(key));
        }
    }

    #[test]
    fn test_parse_unknown_key() {
        let err = "publishArticle".parse::<EventKey>().unwrap_err();
        assert_eq!(err, UnknownEventKey("publishArticle".to_string()));
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&EventKey::ManualTrigger).unwrap();
        assert_eq!(json, "\"manualTriggerEvent\"");

        let key: EventKey = serde_json::from_str("\"afterUpdateArticle\"").unwrap();
        assert_eq!(key, EventKey::AfterUpdateArticle);
    }

    #[test]
    fn test_only_before_hooks_are_active() {
        let active: Vec<EventKey> = EventKey::ALL
            .iter()
            .copied()
            .filter(|k| !k.passive())
            .collect();
        assert_eq!(
            active,
            vec![EventKey::BeforeUpdateArticle, EventKey::BeforeUpdateDraft]
        );
    }

    #[test]
    fn test_system_events_lists_all() {
        let events = system_events();
        assert_eq!(events.len(), EventKey::ALL.len());
        assert_eq!(events[0].event_name, EventKey::Login);
        assert!(events.iter().all(|e| !e.label.is_empty()));
    }
}
