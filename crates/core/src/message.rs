//! Result messages attached to executed codes.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Severity of a [`Message`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum MessageType {
    /// Success (or plain informational output).
    #[default]
    Success = 0,
    /// Warning.
    Warning = 1,
    /// Error.
    Error = 2,
}

/// A generic message produced by the server or attached to a resolved code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Severity.
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Timestamp as reported by the server (ISO 8601), if any.
    #[serde(default)]
    pub time: Option<String>,
    /// Message text.
    #[serde(default)]
    pub content: String,
}

impl Message {
    /// Build a message without a timestamp.
    pub fn new(message_type: MessageType, content: impl Into<String>) -> Self {
        Self {
            message_type,
            time: None,
            content: content.into(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message_type {
            MessageType::Error => write!(f, "Error: {}", self.content),
            MessageType::Warning => write!(f, "Warning: {}", self.content),
            MessageType::Success => f.write_str(&self.content),
        }
    }
}

/// Messages produced while executing a code. `null` on the wire when empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeResult(pub Vec<Message>);

impl CodeResult {
    /// Whether there are no messages.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the messages.
    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.0.iter()
    }

    /// Whether any message is an error.
    pub fn is_error(&self) -> bool {
        self.0.iter().any(|m| m.message_type == MessageType::Error)
    }
}

impl fmt::Display for CodeResult {
    /// One line per non-empty message.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for message in self.0.iter().filter(|m| !m.content.is_empty()) {
            writeln!(f, "{message}")?;
        }
        Ok(())
    }
}

impl Serialize for CodeResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.is_empty() {
            serializer.serialize_none()
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for CodeResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(CodeResult(
            Option::<Vec<Message>>::deserialize(deserializer)?.unwrap_or_default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_severity() {
        assert_eq!(Message::new(MessageType::Error, "bad").to_string(), "Error: bad");
        assert_eq!(Message::new(MessageType::Warning, "hm").to_string(), "Warning: hm");
        assert_eq!(Message::new(MessageType::Success, "ok").to_string(), "ok");
    }

    #[test]
    fn result_null_and_list() {
        let empty: CodeResult = serde_json::from_str("null").unwrap();
        assert!(empty.is_empty());
        assert_eq!(serde_json::to_string(&empty).unwrap(), "null");

        let r: CodeResult = serde_json::from_str(
            r#"[{"type":1,"time":"2020-01-01T00:00:00","content":"careful"},{"type":0,"content":""}]"#,
        )
        .unwrap();
        assert_eq!(r.0.len(), 2);
        assert!(!r.is_error());
        assert_eq!(r.to_string(), "Warning: careful\n");
    }
}
