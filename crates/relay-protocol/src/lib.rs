//! # relay-protocol
//!
//! Wire format for the relay.
//!
//! Every frame is a JSON object carried in a single WebSocket message.
//!
//! ## Frame Shapes
//!
//! - `RelayFrame` - `{"targetID": "...", "message": "..."}`, client to relay
//! - `Delivery` - `{"message": "..."}`, relay to the addressed client
//! - `CommandFrame` - `{"action": "...", "data": {...}}`, optional command channel
//!
//! ## Example
//!
//! ```rust
//! use relay_protocol::{codec, Delivery, Inbound};
//!
//! let inbound = codec::decode(br#"{"targetID":"bob","message":"hi"}"#).unwrap();
//! let Inbound::Relay(frame) = inbound else { unreachable!() };
//! assert_eq!(frame.target_id, "bob");
//!
//! let text = codec::encode(&Delivery::new(frame.message)).unwrap();
//! assert_eq!(text, r#"{"message":"hi"}"#);
//! ```

pub mod actions;
pub mod codec;
pub mod frames;

pub use actions::{reply_for, Action, ACTION_NOT_ALLOWED};
pub use codec::{decode, decode_relay, decode_with_text_commands, encode, ProtocolError};
pub use frames::{CommandData, CommandFrame, Delivery, FrameKind, Inbound, RelayFrame};
