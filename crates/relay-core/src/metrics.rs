//! Metric names and recording helpers.
//!
//! Recording goes through the `metrics` facade and is a no-op until a
//! recorder is installed (the server installs a Prometheus exporter).

use metrics::{counter, gauge, histogram};

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "relay_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "relay_connections_active";
    pub const SESSIONS_REGISTERED: &str = "relay_sessions_registered";
    pub const SESSIONS_DISPLACED: &str = "relay_sessions_displaced_total";
    pub const SESSIONS_CLOSED: &str = "relay_sessions_closed_total";
    pub const MESSAGES_TOTAL: &str = "relay_messages_total";
    pub const MESSAGES_BYTES: &str = "relay_messages_bytes";
    pub const COMMANDS_TOTAL: &str = "relay_commands_total";
    pub const LATENCY_SECONDS: &str = "relay_latency_seconds";
    pub const ERRORS_TOTAL: &str = "relay_errors_total";
}

/// Update the registered session gauge.
pub fn set_registered_sessions(count: usize) {
    gauge!(names::SESSIONS_REGISTERED).set(count as f64);
}

/// Record a session pushed out by a newer registration.
pub fn record_displaced() {
    counter!(names::SESSIONS_DISPLACED).increment(1);
}

/// Record a session ending.
pub fn record_session_closed(reason: &'static str) {
    counter!(names::SESSIONS_CLOSED, "reason" => reason).increment(1);
}

/// Record a relayed message and its outcome.
pub fn record_message(bytes: usize, outcome: &'static str) {
    counter!(names::MESSAGES_TOTAL, "outcome" => outcome).increment(1);
    counter!(names::MESSAGES_BYTES, "outcome" => outcome).increment(bytes as u64);
}

/// Record a command answered on the command channel.
pub fn record_command(reply: &'static str) {
    counter!(names::COMMANDS_TOTAL, "reply" => reply).increment(1);
}

/// Record relay cycle latency, labelled by frame kind.
pub fn record_latency(kind: &'static str, seconds: f64) {
    histogram!(names::LATENCY_SECONDS, "kind" => kind).record(seconds);
}

/// Record an error.
pub fn record_error(error_type: &'static str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type).increment(1);
}
