//! # relay-transport
//!
//! Transport abstraction layer for the relay.
//!
//! A connection is handed to the relay as two halves:
//!
//! - **`FrameSource`** - the read half, owned by the session loop
//! - **`FrameSink`** - the write half, shared with other sessions that
//!   relay messages to this connection
//!
//! Implementations:
//!
//! - **WebSocket** - axum's upgraded `WebSocket` (feature `websocket`)
//! - **Memory** - channel-backed pipes for tests (feature `memory`)
//!
//! ```rust,ignore
//! use relay_transport::{FrameSink, FrameSource};
//!
//! async fn echo(mut source: impl FrameSource, mut sink: impl FrameSink) {
//!     while let Ok(Some(data)) = source.recv().await {
//!         let _ = sink.send_text(String::from_utf8_lossy(&data).into_owned()).await;
//!     }
//! }
//! ```

pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

#[cfg(feature = "memory")]
pub mod memory;

pub use traits::{BoxedSink, FrameSink, FrameSource, TransportError};

#[cfg(feature = "websocket")]
pub use websocket::{split_websocket, WebSocketSink, WebSocketSource};
