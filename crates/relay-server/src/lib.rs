//! # relay-server
//!
//! HTTP and WebSocket front end for the relay.
//!
//! Clients connect to `ws://host:port/ws?user_id=<id>` and exchange
//! `{"targetID": ..., "message": ...}` frames with each other.

pub mod config;
pub mod handlers;
pub mod metrics;

pub use config::Config;
pub use handlers::{app, run_server, serve, AppState};
