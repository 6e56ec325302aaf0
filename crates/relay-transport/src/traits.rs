//! Transport abstraction traits for the relay.
//!
//! The session loop only sees these traits, so the same loop runs over a
//! real WebSocket or an in-memory pipe.

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Inbound message exceeds the configured limit.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// The read half of a connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Receive the payload of the next data message.
    ///
    /// Control messages (ping, pong) are consumed internally. Returns
    /// `None` once the peer has closed the connection cleanly.
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Get the remote address of the connection, if available.
    fn remote_addr(&self) -> Option<String> {
        None
    }
}

/// The write half of a connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one text message.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the connection gracefully.
    ///
    /// Closing an already closed sink is not an error.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Check if the sink still accepts messages.
    fn is_open(&self) -> bool;
}

/// Type-erased write half, as stored in a session handle.
pub type BoxedSink = Box<dyn FrameSink>;
