//! Per-connection session state.
//!
//! A `SessionHandle` is created once a connection presents an identifier.
//! The owning session loop keeps the only strong reference; the registry
//! holds a weak one for lookups.

use relay_transport::{BoxedSink, TransportError};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::trace;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique session number.
///
/// Distinguishes two sessions registered under the same identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocate the next session id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sess_{}", self.0)
    }
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted, identifier not yet checked
    Connecting,
    /// In the registry, no frame read yet
    Registered,
    /// Reading and relaying frames
    Relaying,
    /// Terminal
    Closed,
}

impl SessionState {
    /// Check whether moving to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Registered)
                | (Connecting, Closed)
                | (Registered, Relaying)
                | (Registered, Closed)
                | (Relaying, Relaying)
                | (Relaying, Closed)
                | (Closed, Closed)
        )
    }

    /// Move to `next`, ignoring illegal transitions.
    pub fn advance(&mut self, next: SessionState) {
        if self.can_transition_to(next) {
            trace!(from = ?*self, to = ?next, "Session state");
            *self = next;
        }
    }
}

/// Why a session ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed the connection.
    PeerClosed,
    /// Another connection registered the same identifier.
    Displaced,
    /// A relay to this session failed and the sender evicted it.
    Evicted,
    /// No inbound frame within the idle timeout.
    IdleTimeout,
    /// The server is shutting down.
    Shutdown,
}

impl CloseReason {
    /// Short label for logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::PeerClosed => "peer_closed",
            CloseReason::Displaced => "displaced",
            CloseReason::Evicted => "evicted",
            CloseReason::IdleTimeout => "idle_timeout",
            CloseReason::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of a session that ended cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub identifier: String,
    pub session_id: SessionId,
    pub reason: CloseReason,
    /// Messages delivered to their target.
    pub relayed: u64,
    /// Messages dropped (target missing or write failed).
    pub dropped: u64,
}

/// The shared side of a live session.
///
/// Writes from the owning loop and from relaying senders are serialized by
/// the sink mutex, so frames never interleave.
pub struct SessionHandle {
    id: SessionId,
    identifier: String,
    sink: Mutex<BoxedSink>,
    cancel: CancellationToken,
    cancel_reason: OnceLock<CloseReason>,
}

impl SessionHandle {
    /// Create a handle around the connection's write half.
    #[must_use]
    pub fn new(identifier: impl Into<String>, sink: BoxedSink, cancel: CancellationToken) -> Self {
        Self {
            id: SessionId::next(),
            identifier: identifier.into(),
            sink: Mutex::new(sink),
            cancel,
            cancel_reason: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Write one text frame to this session's connection.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the write fails or the connection is
    /// already closed.
    pub async fn deliver(&self, text: String) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        if !sink.is_open() {
            return Err(TransportError::ConnectionClosed);
        }
        sink.send_text(text).await
    }

    /// Write one text frame, giving the write itself at most `limit`.
    ///
    /// Time spent queued behind other writers to this session does not
    /// count toward `limit`.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the write fails, times out or the
    /// connection is already closed.
    pub async fn deliver_within(&self, text: String, limit: Duration) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        if !sink.is_open() {
            return Err(TransportError::ConnectionClosed);
        }
        tokio::time::timeout(limit, sink.send_text(text))
            .await
            .unwrap_or_else(|_| Err(TransportError::SendFailed("write timed out".into())))
    }

    /// Close the connection. Only the owning loop calls this.
    pub(crate) async fn close(&self) -> Result<(), TransportError> {
        self.sink.lock().await.close().await
    }

    /// Ask the owning loop to stop. The first reason given sticks.
    pub fn signal(&self, reason: CloseReason) {
        let _ = self.cancel_reason.set(reason);
        self.cancel.cancel();
    }

    /// Check whether the session was asked to stop.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait until the session is asked to stop.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Reason the session was asked to stop.
    ///
    /// A cancellation inherited from the server token reads as shutdown.
    #[must_use]
    pub fn cancel_reason(&self) -> CloseReason {
        self.cancel_reason
            .get()
            .copied()
            .unwrap_or(CloseReason::Shutdown)
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("identifier", &self.identifier)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_transport::memory::{pipe, SinkEvent};

    #[test]
    fn test_session_ids_are_unique() {
        let a = SessionId::next();
        let b = SessionId::next();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("sess_"));
    }

    #[test]
    fn test_state_transitions() {
        let mut state = SessionState::Connecting;
        state.advance(SessionState::Relaying);
        assert_eq!(state, SessionState::Connecting);

        state.advance(SessionState::Registered);
        state.advance(SessionState::Relaying);
        state.advance(SessionState::Relaying);
        assert_eq!(state, SessionState::Relaying);

        state.advance(SessionState::Closed);
        state.advance(SessionState::Registered);
        assert_eq!(state, SessionState::Closed);
    }

    #[test]
    fn test_empty_identifier_path() {
        assert!(SessionState::Connecting.can_transition_to(SessionState::Closed));
        assert!(!SessionState::Closed.can_transition_to(SessionState::Relaying));
    }

    #[tokio::test]
    async fn test_deliver_writes_to_sink() {
        let (sink, _source, mut peer) = pipe();
        let handle = SessionHandle::new("bob", Box::new(sink), CancellationToken::new());

        handle.deliver(r#"{"message":"hi"}"#.into()).await.unwrap();
        assert_eq!(
            peer.recv().await,
            Some(SinkEvent::Text(r#"{"message":"hi"}"#.into()))
        );
    }

    #[tokio::test]
    async fn test_deliver_fails_fast_on_closed_connection() {
        let (sink, _source, mut peer) = pipe();
        let handle = SessionHandle::new("bob", Box::new(sink), CancellationToken::new());
        peer.stop_reading();

        assert!(matches!(
            handle.deliver("late".into()).await,
            Err(TransportError::ConnectionClosed)
        ));
        assert!(matches!(
            handle
                .deliver_within("late".into(), Duration::from_secs(1))
                .await,
            Err(TransportError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_first_signal_wins() {
        let (sink, _source, _peer) = pipe();
        let handle = SessionHandle::new("bob", Box::new(sink), CancellationToken::new());
        assert!(!handle.is_cancelled());

        handle.signal(CloseReason::Displaced);
        handle.signal(CloseReason::Evicted);
        assert!(handle.is_cancelled());
        assert_eq!(handle.cancel_reason(), CloseReason::Displaced);
    }

    #[test]
    fn test_parent_cancel_reads_as_shutdown() {
        let parent = CancellationToken::new();
        let (sink, _source, _peer) = pipe();
        let handle = SessionHandle::new("bob", Box::new(sink), parent.child_token());

        parent.cancel();
        assert!(handle.is_cancelled());
        assert_eq!(handle.cancel_reason(), CloseReason::Shutdown);
    }
}
