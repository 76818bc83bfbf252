// ABOUTME: Result events produced by sub-tasks and forwarded by coordinators.
// ABOUTME: Carries text fragments, an optional error payload, and metadata.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Error code attached to failure events emitted for a failed sibling.
pub const SUB_TASK_ERROR: &str = "SUB_TASK_ERROR";

/// Error payload carried by a failure event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventError {
    pub code: String,
    pub message: String,
}

/// One result event from a sub-task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Event {
    /// Who produced the event.
    pub author: String,

    /// Text fragments, in order.
    pub parts: Vec<String>,

    /// Set only on failure events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<EventError>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Event {
    /// A single-fragment text event.
    pub fn text(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            parts: vec![text.into()],
            ..Default::default()
        }
    }

    /// An event with no text at all.
    pub fn empty(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            ..Default::default()
        }
    }

    /// The failure event a coordinator emits for a failed sibling.
    pub fn failure(
        author: impl Into<String>,
        sub_task: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let sub_task = sub_task.into();
        let message = message.into();
        Self {
            author: author.into(),
            parts: vec![format!("Error in sub-task {}: {}", sub_task, message)],
            error: Some(EventError {
                code: SUB_TASK_ERROR.to_string(),
                message,
            }),
            metadata: HashMap::from([
                ("sub_task".to_string(), serde_json::Value::String(sub_task)),
                ("error".to_string(), serde_json::Value::Bool(true)),
            ]),
        }
    }

    /// Append another text fragment.
    pub fn with_part(mut self, text: impl Into<String>) -> Self {
        self.parts.push(text.into());
        self
    }

    /// Attach a metadata value. Fails if the value has no JSON form.
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Serialize,
    ) -> Result<Self, serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.metadata.insert(key.into(), value);
        Ok(self)
    }

    /// Non-empty text fragments.
    pub fn text_fragments(&self) -> impl Iterator<Item = &str> {
        self.parts
            .iter()
            .map(String::as_str)
            .filter(|p| !p.is_empty())
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_event_shape() {
        let event = Event::failure("collectors", "east", "connection refused");

        assert!(event.is_error());
        let err = event.error.as_ref().unwrap();
        assert_eq!(err.code, SUB_TASK_ERROR);
        assert_eq!(err.message, "connection refused");
        assert_eq!(event.metadata["sub_task"], "east");
        assert_eq!(event.metadata["error"], true);
        assert!(event.parts[0].contains("east"));
    }

    #[test]
    fn test_with_metadata_reports_unserializable_value() {
        let event = Event::text("a", "one").with_metadata("attempt", 2).unwrap();
        assert_eq!(event.metadata["attempt"], 2);

        // JSON object keys must be strings.
        let tuple_keyed = HashMap::from([((1u8, 2u8), "x")]);
        let err = Event::text("a", "one").with_metadata("bad", tuple_keyed);
        assert!(err.is_err());
    }

    #[test]
    fn test_text_fragments_skip_empty() {
        let event = Event::text("a", "one").with_part("").with_part("two");
        let fragments: Vec<_> = event.text_fragments().collect();
        assert_eq!(fragments, vec!["one", "two"]);
    }
}
