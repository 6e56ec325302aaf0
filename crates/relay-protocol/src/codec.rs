//! Codec for encoding and decoding relay frames.
//!
//! Frames are JSON objects, one per transport message. Relay frames are a
//! flat set of string fields: any non-string value is rejected, extra
//! string fields are ignored.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::frames::{CommandFrame, Inbound, RelayFrame, ACTION_FIELD, MESSAGE_FIELD, TARGET_FIELD};

/// Maximum encoded frame size (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds maximum size.
    #[error("Frame size {0} exceeds maximum {MAX_FRAME_SIZE}")]
    FrameTooLarge(usize),

    /// Malformed JSON or a shape serde could not map.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Top-level JSON value is not an object.
    #[error("Frame is not a JSON object")]
    NotAnObject,

    /// A relay frame field holds something other than a string.
    #[error("Field `{0}` is not a string")]
    FieldNotString(String),

    /// A required relay frame field is absent.
    #[error("Missing field `{0}`")]
    MissingField(&'static str),
}

/// Encode any outbound frame as JSON text.
///
/// # Errors
///
/// Returns an error if serialization fails or the result is too large.
pub fn encode<T: Serialize>(frame: &T) -> Result<String, ProtocolError> {
    let text = serde_json::to_string(frame)?;
    check_size(text.len())?;
    Ok(text)
}

/// Decode an inbound frame, recognizing both relay and command shapes.
///
/// An object with an `action` key and no `targetID` key is a command.
///
/// # Errors
///
/// Returns an error if the data is not a JSON object of the expected shape.
pub fn decode(data: &[u8]) -> Result<Inbound, ProtocolError> {
    let object = decode_object(data)?;

    if object.contains_key(ACTION_FIELD) && !object.contains_key(TARGET_FIELD) {
        let command: CommandFrame = serde_json::from_value(Value::Object(object))?;
        return Ok(Inbound::Command(command));
    }

    relay_from_object(&object).map(Inbound::Relay)
}

/// Decode an inbound frame, reading anything that is not a JSON object as
/// a bare command name.
///
/// `"open_case\n"` decodes to the command `open_case`. Objects follow the
/// same rules as [`decode`].
///
/// # Errors
///
/// Returns an error if a JSON object has the wrong shape, or if the data is
/// neither an object nor non-empty UTF-8 text.
pub fn decode_with_text_commands(data: &[u8]) -> Result<Inbound, ProtocolError> {
    match decode(data) {
        Err(err @ (ProtocolError::Json(_) | ProtocolError::NotAnObject)) => {
            match std::str::from_utf8(data).map(str::trim) {
                Ok(action) if !action.is_empty() => {
                    Ok(Inbound::Command(CommandFrame::new(action)))
                }
                _ => Err(err),
            }
        }
        other => other,
    }
}

/// Decode a relay frame only.
///
/// # Errors
///
/// Returns an error if the data is not a flat object of strings carrying
/// both `targetID` and `message`.
pub fn decode_relay(data: &[u8]) -> Result<RelayFrame, ProtocolError> {
    let object = decode_object(data)?;
    relay_from_object(&object)
}

fn check_size(len: usize) -> Result<(), ProtocolError> {
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    Ok(())
}

fn decode_object(data: &[u8]) -> Result<Map<String, Value>, ProtocolError> {
    check_size(data.len())?;

    match serde_json::from_slice(data)? {
        Value::Object(object) => Ok(object),
        _ => Err(ProtocolError::NotAnObject),
    }
}

fn relay_from_object(object: &Map<String, Value>) -> Result<RelayFrame, ProtocolError> {
    if let Some((key, _)) = object.iter().find(|(_, value)| !value.is_string()) {
        return Err(ProtocolError::FieldNotString(key.clone()));
    }

    let field = |name: &'static str| {
        object
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or(ProtocolError::MissingField(name))
    };

    Ok(RelayFrame {
        target_id: field(TARGET_FIELD)?,
        message: field(MESSAGE_FIELD)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::Delivery;

    #[test]
    fn test_decode_relay_frame() {
        let inbound = decode(br#"{"targetID":"bob","message":"hi"}"#).unwrap();
        assert_eq!(inbound, Inbound::Relay(RelayFrame::new("bob", "hi")));
    }

    #[test]
    fn test_decode_ignores_extra_string_fields() {
        let frame = decode_relay(br#"{"targetID":"bob","message":"hi","trace":"x"}"#).unwrap();
        assert_eq!(frame, RelayFrame::new("bob", "hi"));
    }

    #[test]
    fn test_decode_rejects_non_string_field() {
        match decode_relay(br#"{"targetID":"bob","message":42}"#) {
            Err(ProtocolError::FieldNotString(field)) => assert_eq!(field, "message"),
            other => panic!("Expected FieldNotString, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_missing_field() {
        match decode_relay(br#"{"message":"hi"}"#) {
            Err(ProtocolError::MissingField("targetID")) => {}
            other => panic!("Expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_malformed_json() {
        assert!(matches!(decode(b"not json"), Err(ProtocolError::Json(_))));
        assert!(matches!(decode(b"[1,2]"), Err(ProtocolError::NotAnObject)));
    }

    #[test]
    fn test_decode_command_frame() {
        let inbound = decode(br#"{"action":"open_case","data":{"case_id":"c-9"}}"#).unwrap();
        match inbound {
            Inbound::Command(cmd) => {
                assert_eq!(cmd.action, "open_case");
                assert_eq!(cmd.data.unwrap().case_id.as_deref(), Some("c-9"));
            }
            other => panic!("Expected command, got {:?}", other),
        }
    }

    #[test]
    fn test_target_field_wins_over_action() {
        let inbound = decode(br#"{"action":"OPEN_CASE","targetID":"bob","message":"m"}"#).unwrap();
        assert_eq!(inbound.kind(), crate::FrameKind::Relay);
    }

    #[test]
    fn test_decode_relay_rejects_command() {
        assert!(matches!(
            decode_relay(br#"{"action":"OPEN_CASE"}"#),
            Err(ProtocolError::MissingField("targetID"))
        ));
    }

    #[test]
    fn test_text_command_fallback() {
        assert_eq!(
            decode_with_text_commands(b"open_patient\n").unwrap(),
            Inbound::Command(CommandFrame::new("open_patient"))
        );
        assert_eq!(
            decode_with_text_commands(br#"{"targetID":"bob","message":"hi"}"#).unwrap(),
            Inbound::Relay(RelayFrame::new("bob", "hi"))
        );
    }

    #[test]
    fn test_text_command_keeps_object_errors() {
        assert!(matches!(
            decode_with_text_commands(br#"{"targetID":"bob"}"#),
            Err(ProtocolError::MissingField("message"))
        ));
        assert!(matches!(
            decode_with_text_commands(b"  \n"),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(
            decode_with_text_commands(&[0xff, 0xfe]),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn test_encode_delivery() {
        let text = encode(&Delivery::new("héllo \"world\"")).unwrap();
        assert_eq!(text, r#"{"message":"héllo \"world\""}"#);
    }
}
