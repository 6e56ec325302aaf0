//! In-memory transport.
//!
//! A pipe connects a session's source/sink halves to a `MemoryPeer` that
//! plays the remote client. Used to drive session loops without sockets.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::traits::{FrameSink, FrameSource, TransportError};

/// What the session wrote to the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Text(String),
    Closed,
}

enum PeerEvent {
    Data(Vec<u8>),
    Fail(String),
}

/// Create a connected pipe.
#[must_use]
pub fn pipe() -> (MemorySink, MemorySource, MemoryPeer) {
    let (peer_tx, source_rx) = mpsc::unbounded_channel();
    let (sink_tx, peer_rx) = mpsc::unbounded_channel();

    (
        MemorySink { tx: Some(sink_tx) },
        MemorySource { rx: source_rx },
        MemoryPeer {
            tx: Some(peer_tx),
            rx: peer_rx,
        },
    )
}

/// Read half of an in-memory connection.
pub struct MemorySource {
    rx: mpsc::UnboundedReceiver<PeerEvent>,
}

#[async_trait]
impl FrameSource for MemorySource {
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        match self.rx.recv().await {
            Some(PeerEvent::Data(data)) => Ok(Some(data)),
            Some(PeerEvent::Fail(reason)) => Err(TransportError::ReceiveFailed(reason)),
            None => Ok(None),
        }
    }

    fn remote_addr(&self) -> Option<String> {
        Some("memory".to_string())
    }
}

/// Write half of an in-memory connection.
pub struct MemorySink {
    tx: Option<mpsc::UnboundedSender<SinkEvent>>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::ConnectionClosed)?;
        tx.send(SinkEvent::Text(text))
            .map_err(|_| TransportError::SendFailed("peer stopped reading".into()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(SinkEvent::Closed);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

/// The remote end of a pipe.
pub struct MemoryPeer {
    tx: Option<mpsc::UnboundedSender<PeerEvent>>,
    rx: mpsc::UnboundedReceiver<SinkEvent>,
}

impl MemoryPeer {
    /// Send a data message to the session.
    ///
    /// Returns `false` if the session no longer reads.
    pub fn send(&self, data: impl Into<Vec<u8>>) -> bool {
        self.tx
            .as_ref()
            .is_some_and(|tx| tx.send(PeerEvent::Data(data.into())).is_ok())
    }

    /// Make the session's next read fail with a transport error.
    pub fn fail(&self, reason: impl Into<String>) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(PeerEvent::Fail(reason.into()));
        }
    }

    /// Close the peer's side; the session reads end-of-stream.
    pub fn hang_up(&mut self) {
        self.tx = None;
    }

    /// Stop accepting writes; later session writes fail.
    pub fn stop_reading(&mut self) {
        self.rx.close();
    }

    /// Wait for the next thing the session wrote.
    ///
    /// Returns `None` once the session dropped its sink.
    pub async fn recv(&mut self) -> Option<SinkEvent> {
        self.rx.recv().await
    }

    /// Take a pending write without waiting.
    pub fn try_recv(&mut self) -> Option<SinkEvent> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pipe_both_directions() {
        let (mut sink, mut source, mut peer) = pipe();

        assert!(peer.send("ping"));
        assert_eq!(source.recv().await.unwrap(), Some(b"ping".to_vec()));

        sink.send_text("pong".into()).await.unwrap();
        assert_eq!(peer.recv().await, Some(SinkEvent::Text("pong".into())));
    }

    #[tokio::test]
    async fn test_hang_up_ends_stream() {
        let (_sink, mut source, mut peer) = pipe();
        peer.hang_up();
        assert_eq!(source.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fail_surfaces_error() {
        let (_sink, mut source, peer) = pipe();
        peer.fail("reset");
        assert!(matches!(
            source.recv().await,
            Err(TransportError::ReceiveFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_stop_reading_fails_writes() {
        let (mut sink, _source, mut peer) = pipe();
        peer.stop_reading();
        assert!(!sink.is_open());
        assert!(sink.send_text("lost".into()).await.is_err());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (mut sink, _source, mut peer) = pipe();
        sink.close().await.unwrap();
        sink.close().await.unwrap();
        assert_eq!(peer.recv().await, Some(SinkEvent::Closed));
        assert!(sink.send_text("late".into()).await.is_err());
    }
}
