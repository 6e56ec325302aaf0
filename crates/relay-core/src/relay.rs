//! The session loop.
//!
//! `Relay` owns a registry and runs one loop per accepted connection:
//! register the identifier, read frames until the connection ends, forward
//! each message to its target, then deregister and close.

use crate::error::RelayError;
use crate::metrics;
use crate::registry::Registry;
use crate::session::{CloseReason, SessionHandle, SessionReport, SessionState};
use relay_protocol::{codec, reply_for, Delivery, Inbound, RelayFrame};
use relay_transport::{BoxedSink, FrameSource, TransportError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default bound on a single write to a target.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-session behaviour.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Close sessions that send nothing for this long. `None` waits forever.
    pub idle_timeout: Option<Duration>,
    /// Bound on a write to a target before the delivery counts as failed.
    pub write_timeout: Duration,
    /// Answer `{"action": ...}` frames instead of rejecting them.
    pub command_channel: bool,
    /// Also read frames that are not JSON objects as bare command names.
    /// Only consulted when `command_channel` is on.
    pub text_commands: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            idle_timeout: None,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            command_channel: true,
            text_commands: false,
        }
    }
}

enum ReadOutcome {
    Frame(Vec<u8>),
    Closed(CloseReason),
}

/// Keeps a session in the registry while it is alive.
///
/// Dropping it removes the entry, including when the session future is
/// dropped before it finishes.
struct Registration<'a> {
    registry: &'a Registry,
    handle: Arc<SessionHandle>,
}

impl<'a> Registration<'a> {
    fn new(registry: &'a Registry, handle: Arc<SessionHandle>) -> Self {
        if let Some(displaced) = registry.register(&handle) {
            displaced.signal(CloseReason::Displaced);
            metrics::record_displaced();
        }
        metrics::set_registered_sessions(registry.len());
        Self { registry, handle }
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if self.registry.unregister_session(&self.handle) {
            metrics::set_registered_sessions(self.registry.len());
        }
    }
}

/// Relay engine shared by every connection of a server.
pub struct Relay {
    registry: Arc<Registry>,
    options: SessionOptions,
    shutdown: CancellationToken,
}

impl Relay {
    /// Create a relay with its own empty registry.
    #[must_use]
    pub fn new(options: SessionOptions) -> Self {
        Self::with_registry(Arc::new(Registry::new()), options)
    }

    /// Create a relay over an existing registry.
    #[must_use]
    pub fn with_registry(registry: Arc<Registry>, options: SessionOptions) -> Self {
        Self {
            registry,
            options,
            shutdown: CancellationToken::new(),
        }
    }

    /// Tie session lifetimes to an outer shutdown token.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Token cancelled when the relay shuts down.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop every running session.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Serve one connection until it ends.
    ///
    /// An empty identifier closes the connection without registering.
    /// Whatever ends the loop, the session is deregistered and its
    /// connection closed before this returns.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that ended the session: a missing identifier,
    /// an undecodable frame, or a failure on the session's own connection.
    pub async fn run_session<S>(
        &self,
        identifier: &str,
        mut source: S,
        mut sink: BoxedSink,
    ) -> Result<SessionReport, RelayError>
    where
        S: FrameSource,
    {
        let mut state = SessionState::Connecting;

        if identifier.is_empty() {
            warn!(remote = ?source.remote_addr(), "User ID is missing");
            state.advance(SessionState::Closed);
            if let Err(e) = sink.close().await {
                debug!(error = %e, "Close after missing identifier failed");
            }
            metrics::record_error(RelayError::MissingIdentifier.kind());
            return Err(RelayError::MissingIdentifier);
        }

        let handle = Arc::new(SessionHandle::new(
            identifier,
            sink,
            self.shutdown.child_token(),
        ));

        let registration = Registration::new(&self.registry, Arc::clone(&handle));
        state.advance(SessionState::Registered);

        info!(
            identifier = %identifier,
            session = %handle.id(),
            remote = ?source.remote_addr(),
            "User connected"
        );

        let mut report = SessionReport {
            identifier: identifier.to_string(),
            session_id: handle.id(),
            reason: CloseReason::PeerClosed,
            relayed: 0,
            dropped: 0,
        };

        let result = self
            .relay_loop(&handle, &mut source, &mut state, &mut report)
            .await;

        state.advance(SessionState::Closed);
        drop(registration);
        if let Err(e) = handle.close().await {
            debug!(session = %handle.id(), error = %e, "Close failed");
        }

        match result {
            Ok(reason) => {
                report.reason = reason;
                metrics::record_session_closed(reason.as_str());
                info!(
                    identifier = %identifier,
                    session = %handle.id(),
                    reason = %reason,
                    relayed = report.relayed,
                    dropped = report.dropped,
                    "User disconnected"
                );
                Ok(report)
            }
            Err(e) => {
                metrics::record_session_closed(e.kind());
                metrics::record_error(e.kind());
                warn!(
                    identifier = %identifier,
                    session = %handle.id(),
                    error = %e,
                    relayed = report.relayed,
                    dropped = report.dropped,
                    "User disconnected"
                );
                Err(e)
            }
        }
    }

    async fn relay_loop<S: FrameSource>(
        &self,
        handle: &SessionHandle,
        source: &mut S,
        state: &mut SessionState,
        report: &mut SessionReport,
    ) -> Result<CloseReason, RelayError> {
        loop {
            let data = match self.read_next(handle, source).await? {
                ReadOutcome::Frame(data) => data,
                ReadOutcome::Closed(reason) => return Ok(reason),
            };
            state.advance(SessionState::Relaying);
            let start = Instant::now();

            let inbound = match (self.options.command_channel, self.options.text_commands) {
                (false, _) => Inbound::Relay(codec::decode_relay(&data)?),
                (true, false) => codec::decode(&data)?,
                (true, true) => codec::decode_with_text_commands(&data)?,
            };
            let kind = inbound.kind();

            match inbound {
                Inbound::Relay(frame) => {
                    let bytes = frame.message.len();
                    // A busy target must not hold this session past its own cancellation
                    let forwarded = tokio::select! {
                        biased;

                        _ = handle.cancelled() => {
                            report.dropped += 1;
                            metrics::record_message(bytes, "dropped");
                            return Ok(handle.cancel_reason());
                        }

                        result = self.forward(frame) => result,
                    };

                    match forwarded {
                        Ok(()) => {
                            report.relayed += 1;
                            metrics::record_message(bytes, "delivered");
                        }
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            report.dropped += 1;
                            metrics::record_message(bytes, "dropped");
                            metrics::record_error(e.kind());
                            match &e {
                                RelayError::TargetUnavailable(_) => {
                                    info!(session = %handle.id(), "{}", e)
                                }
                                _ => warn!(session = %handle.id(), error = %e, "Relay failed"),
                            }
                        }
                    }
                }
                Inbound::Command(command) => {
                    let reply = reply_for(&command.action);
                    debug!(session = %handle.id(), action = %command.action, reply, "Command");
                    metrics::record_command(reply);
                    handle.deliver(reply.to_string()).await?;
                }
            }

            metrics::record_latency(kind.as_str(), start.elapsed().as_secs_f64());
        }
    }

    async fn read_next<S: FrameSource>(
        &self,
        handle: &SessionHandle,
        source: &mut S,
    ) -> Result<ReadOutcome, TransportError> {
        let read = async {
            match self.options.idle_timeout {
                Some(limit) => tokio::time::timeout(limit, source.recv()).await.ok(),
                None => Some(source.recv().await),
            }
        };

        tokio::select! {
            biased;

            _ = handle.cancelled() => Ok(ReadOutcome::Closed(handle.cancel_reason())),

            read = read => match read {
                Some(Ok(Some(data))) => Ok(ReadOutcome::Frame(data)),
                Some(Ok(None)) => Ok(ReadOutcome::Closed(CloseReason::PeerClosed)),
                Some(Err(e)) => Err(e),
                None => Ok(ReadOutcome::Closed(CloseReason::IdleTimeout)),
            },
        }
    }

    /// Deliver one relay frame to its target.
    ///
    /// Waiting for other writers to the same target is not bounded by the
    /// write timeout. A failed write evicts the target from the registry
    /// and tells its loop to stop.
    async fn forward(&self, frame: RelayFrame) -> Result<(), RelayError> {
        let Some(target) = self.registry.lookup(&frame.target_id) else {
            return Err(RelayError::TargetUnavailable(frame.target_id));
        };

        let text = codec::encode(&Delivery::new(frame.message)).map_err(|e| {
            RelayError::Delivery {
                target: frame.target_id.clone(),
                source: TransportError::SendFailed(e.to_string()),
            }
        })?;

        if let Err(source) = target
            .deliver_within(text, self.options.write_timeout)
            .await
        {
            if self.registry.unregister_session(&target) {
                debug!(identifier = %frame.target_id, session = %target.id(), "Evicted stale session");
                metrics::set_registered_sessions(self.registry.len());
            }
            target.signal(CloseReason::Evicted);
            return Err(RelayError::Delivery {
                target: frame.target_id,
                source,
            });
        }

        Ok(())
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}
