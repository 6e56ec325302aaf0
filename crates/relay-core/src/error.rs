//! Relay errors.

use relay_protocol::ProtocolError;
use relay_transport::TransportError;
use thiserror::Error;

/// Everything that can go wrong while serving a session.
///
/// Fatal errors end the session that hit them. Non-fatal ones drop a single
/// message and the session keeps reading. No error crosses to another
/// session.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The connection arrived without an identifier.
    #[error("Identifier is missing")]
    MissingIdentifier,

    /// Inbound frame could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] ProtocolError),

    /// Addressed identifier is not registered.
    #[error("User {0} not connected")]
    TargetUnavailable(String),

    /// Writing to the addressed session failed.
    #[error("Delivery to {target} failed: {source}")]
    Delivery {
        target: String,
        source: TransportError,
    },

    /// The session's own connection failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl RelayError {
    /// Whether the error ends the session that encountered it.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            RelayError::MissingIdentifier | RelayError::Decode(_) | RelayError::Transport(_) => {
                true
            }
            RelayError::TargetUnavailable(_) | RelayError::Delivery { .. } => false,
        }
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::MissingIdentifier => "missing_identifier",
            RelayError::Decode(_) => "decode",
            RelayError::TargetUnavailable(_) => "target_unavailable",
            RelayError::Delivery { .. } => "delivery",
            RelayError::Transport(_) => "transport",
        }
    }
}
