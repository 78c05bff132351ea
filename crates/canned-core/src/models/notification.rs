use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::extras;

/// A single remote-input slot a notification action expects to be filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteInput {
    /// Key the filled text must be stored under when the action fires.
    pub result_key: String,
    /// Human-readable slot label, when the posting app set one.
    #[serde(default)]
    pub label: Option<String>,
}

/// An auxiliary action declared on a notification (wearable-style action).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    /// Opaque handle the bridge uses to fire this action.
    pub action_id: String,
    /// Action title shown by the platform ("Reply", "Mark as read", ...).
    #[serde(default)]
    pub title: Option<String>,
    /// Input slots this action expects; empty for fire-only actions.
    #[serde(default)]
    pub remote_inputs: Vec<RemoteInput>,
}

/// One incoming notification, as delivered by the platform bridge.
///
/// The `extras` bag carries the platform metadata verbatim, keyed by the
/// names in [`crate::constants::extras`]. Fields the pipeline cares about
/// are exposed through typed accessors; everything else rides along
/// untouched. Created once per delivery, consumed synchronously, dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Package name of the app that posted the notification.
    pub package: String,
    /// The notification's own timestamp in epoch millis. `0` means the
    /// posting app never set one.
    #[serde(default)]
    pub when: u64,
    /// Raw metadata bag, keyed by the platform extras names.
    #[serde(default)]
    pub extras: Map<String, Value>,
    /// Auxiliary actions declared on the notification.
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
}

impl NotificationEvent {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            when: 0,
            extras: Map::new(),
            actions: Vec::new(),
        }
    }

    pub fn with_when(mut self, when: u64) -> Self {
        self.when = when;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.extras
            .insert(extras::TITLE.to_string(), Value::String(title.into()));
        self
    }

    pub fn with_group_conversation(mut self, group: bool) -> Self {
        self.extras
            .insert(extras::IS_GROUP_CONVERSATION.to_string(), Value::Bool(group));
        self
    }

    pub fn with_hidden_conversation_title(mut self, title: impl Into<String>) -> Self {
        self.extras.insert(
            extras::HIDDEN_CONVERSATION_TITLE.to_string(),
            Value::String(title.into()),
        );
        self
    }

    /// Attach a synthetic embedded-message list of the given length. Only
    /// the length matters to the pipeline.
    pub fn with_message_count(mut self, count: usize) -> Self {
        let messages = vec![Value::Object(Map::new()); count];
        self.extras
            .insert(extras::MESSAGES.to_string(), Value::Array(messages));
        self
    }

    /// Attach a reply-capable action whose slots use the given result keys.
    pub fn with_reply_action(mut self, action_id: impl Into<String>, keys: &[&str]) -> Self {
        self.actions.push(NotificationAction {
            action_id: action_id.into(),
            title: Some("Reply".to_string()),
            remote_inputs: keys
                .iter()
                .map(|key| RemoteInput {
                    result_key: (*key).to_string(),
                    label: None,
                })
                .collect(),
        });
        self
    }

    /// Plain notification title, when present.
    pub fn title(&self) -> Option<&str> {
        self.extras.get(extras::TITLE).and_then(Value::as_str)
    }

    /// Whether the platform flagged this as a group conversation. Absent or
    /// malformed values count as not-a-group.
    pub fn is_group_conversation(&self) -> bool {
        self.extras
            .get(extras::IS_GROUP_CONVERSATION)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Unmangled group name, when the platform supplied one.
    pub fn hidden_conversation_title(&self) -> Option<&str> {
        self.extras
            .get(extras::HIDDEN_CONVERSATION_TITLE)
            .and_then(Value::as_str)
    }

    /// Number of entries in the embedded per-message list, zero when absent.
    pub fn message_count(&self) -> usize {
        self.extras
            .get(extras::MESSAGES)
            .and_then(Value::as_array)
            .map(|messages| messages.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors_on_empty_extras() {
        let event = NotificationEvent::new("com.whatsapp");
        assert_eq!(event.title(), None);
        assert!(!event.is_group_conversation());
        assert_eq!(event.hidden_conversation_title(), None);
        assert_eq!(event.message_count(), 0);
    }

    #[test]
    fn test_builder_round_trip() {
        let event = NotificationEvent::new("com.whatsapp")
            .with_when(1_700_000_000_000)
            .with_title("Alice")
            .with_group_conversation(true)
            .with_hidden_conversation_title("Team Chat")
            .with_message_count(3);

        assert_eq!(event.when, 1_700_000_000_000);
        assert_eq!(event.title(), Some("Alice"));
        assert!(event.is_group_conversation());
        assert_eq!(event.hidden_conversation_title(), Some("Team Chat"));
        assert_eq!(event.message_count(), 3);
    }

    #[test]
    fn test_malformed_extras_degrade_to_defaults() {
        let mut event = NotificationEvent::new("com.whatsapp");
        event.extras.insert(
            crate::constants::extras::IS_GROUP_CONVERSATION.to_string(),
            serde_json::Value::String("yes".to_string()),
        );
        event.extras.insert(
            crate::constants::extras::TITLE.to_string(),
            serde_json::Value::Number(7.into()),
        );

        assert!(!event.is_group_conversation());
        assert_eq!(event.title(), None);
    }

    #[test]
    fn test_deserialize_with_missing_fields() {
        let event: NotificationEvent =
            serde_json::from_str(r#"{"package": "org.telegram.messenger"}"#).unwrap();
        assert_eq!(event.package, "org.telegram.messenger");
        assert_eq!(event.when, 0);
        assert!(event.extras.is_empty());
        assert!(event.actions.is_empty());
    }

    #[test]
    fn test_deserialize_full_event() {
        let json = r#"{
            "package": "com.whatsapp",
            "when": 1700000000000,
            "extras": {
                "android.title": "Bob: hey",
                "android.isGroupConversation": true
            },
            "actions": [
                {
                    "action_id": "reply-0",
                    "title": "Reply",
                    "remote_inputs": [{"result_key": "reply_text"}]
                },
                {"action_id": "read-1"}
            ]
        }"#;
        let event: NotificationEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.title(), Some("Bob: hey"));
        assert!(event.is_group_conversation());
        assert_eq!(event.actions.len(), 2);
        assert_eq!(event.actions[0].remote_inputs[0].result_key, "reply_text");
        assert_eq!(event.actions[0].remote_inputs[0].label, None);
        assert!(event.actions[1].remote_inputs.is_empty());
    }
}
