//! Frame types for the relay protocol.
//!
//! Inbound frames are flat JSON objects of string fields. The relay
//! forwards only the `message` field of a relay frame to its target.

use serde::{Deserialize, Serialize};
use std::fmt;

/// JSON key naming the addressed identifier.
pub const TARGET_FIELD: &str = "targetID";

/// JSON key carrying the relayed text.
pub const MESSAGE_FIELD: &str = "message";

/// JSON key that marks a command frame.
pub const ACTION_FIELD: &str = "action";

/// Kinds of inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Relay,
    Command,
}

impl FrameKind {
    /// Name used in logs and metric labels.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FrameKind::Relay => "relay",
            FrameKind::Command => "command",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message addressed to another registered identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayFrame {
    /// Identifier of the recipient.
    #[serde(rename = "targetID")]
    pub target_id: String,
    /// Text to deliver.
    pub message: String,
}

impl RelayFrame {
    /// Create a new relay frame.
    #[must_use]
    pub fn new(target_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            message: message.into(),
        }
    }
}

/// What the target receives for each relayed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub message: String,
}

impl Delivery {
    /// Create a new delivery frame.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Optional payload of a command frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
}

/// A command addressed to the relay itself.
///
/// The relay answers on the sender's own connection with the translated
/// action name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandFrame {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<CommandData>,
}

impl CommandFrame {
    /// Create a command frame without data.
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            data: None,
        }
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Relay(RelayFrame),
    Command(CommandFrame),
}

impl Inbound {
    /// Get the frame kind.
    #[must_use]
    pub fn kind(&self) -> FrameKind {
        match self {
            Inbound::Relay(_) => FrameKind::Relay,
            Inbound::Command(_) => FrameKind::Command,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_frame_wire_names() {
        let frame = RelayFrame::new("bob", "hi");
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json, serde_json::json!({"targetID": "bob", "message": "hi"}));
    }

    #[test]
    fn test_command_data_omits_empty_fields() {
        let frame = CommandFrame {
            action: "OPEN_CASE".into(),
            data: Some(CommandData {
                case_id: Some("c-1".into()),
                patient_id: None,
            }),
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"action":"OPEN_CASE","data":{"case_id":"c-1"}}"#);
    }

    #[test]
    fn test_inbound_kind() {
        assert_eq!(Inbound::Relay(RelayFrame::new("a", "b")).kind(), FrameKind::Relay);
        assert_eq!(
            Inbound::Command(CommandFrame::new("OPEN_CASE")).kind().to_string(),
            "command"
        );
    }
}
