//! Wire form of saga events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Suffix appended to an event name for its forward action.
pub const FORWARD_SUFFIX: &str = "_forward";

/// Suffix appended to an event name for its compensating action.
pub const BACK_SUFFIX: &str = "_back";

/// Which of a step's two handlers a message targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Back,
}

impl Direction {
    pub fn suffix(&self) -> &'static str {
        match self {
            Direction::Forward => FORWARD_SUFFIX,
            Direction::Back => BACK_SUFFIX,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Back => "back",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `{"event": "<name><suffix>", "payload": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaMessage {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

impl SagaMessage {
    pub fn new(event: &str, direction: Direction, payload: Value) -> Self {
        Self {
            event: format!("{event}{}", direction.suffix()),
            payload,
        }
    }

    /// Splits the wire event into the step name and direction.
    ///
    /// Returns `None` if the event carries neither suffix.
    pub fn split_event(&self) -> Option<(&str, Direction)> {
        split_event(&self.event)
    }
}

/// Splits a wire event name into the step name and direction.
pub fn split_event(event: &str) -> Option<(&str, Direction)> {
    if let Some(name) = event.strip_suffix(FORWARD_SUFFIX) {
        Some((name, Direction::Forward))
    } else {
        event
            .strip_suffix(BACK_SUFFIX)
            .map(|name| (name, Direction::Back))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_appends_suffix() {
        let message = SagaMessage::new("reserve_stock", Direction::Back, json!({"id": 1}));
        assert_eq!(message.event, "reserve_stock_back");
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"event": "reserve_stock_back", "payload": {"id": 1}})
        );
    }

    #[test]
    fn test_split_event() {
        let forward = SagaMessage::new("charge", Direction::Forward, Value::Null);
        assert_eq!(forward.split_event(), Some(("charge", Direction::Forward)));

        let back = SagaMessage::new("charge", Direction::Back, Value::Null);
        assert_eq!(back.split_event(), Some(("charge", Direction::Back)));

        let bare = SagaMessage {
            event: "charge".to_string(),
            payload: Value::Null,
        };
        assert_eq!(bare.split_event(), None);
    }

    #[test]
    fn test_name_containing_suffix_text() {
        let message = SagaMessage::new("roll_back", Direction::Forward, Value::Null);
        assert_eq!(message.split_event(), Some(("roll_back", Direction::Forward)));
    }

    #[test]
    fn test_missing_payload_is_null() {
        let message: SagaMessage = serde_json::from_str(r#"{"event": "x_forward"}"#).unwrap();
        assert_eq!(message.payload, Value::Null);
    }
}
