//! # relay-core
//!
//! Connection registry and per-connection session loop for the relay.
//!
//! - **Registry** - identifier to live session, last registration wins
//! - **Relay** - owns a registry and runs one session loop per connection
//! - **SessionHandle** - the shared, write-serialized side of a session
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  register   ┌─────────────┐
//! │ Session loop│────────────▶│  Registry   │
//! │ (alice)     │◀────────────│             │
//! └─────────────┘   lookup    └─────────────┘
//!        │                           │
//!        │ {"message": ...}          ▼
//!        └──────────────────▶ SessionHandle (bob)
//! ```

pub mod error;
pub mod metrics;
pub mod registry;
pub mod relay;
pub mod session;

pub use error::RelayError;
pub use registry::{Registry, RegistryStats};
pub use relay::{Relay, SessionOptions};
pub use session::{CloseReason, SessionHandle, SessionId, SessionReport, SessionState};
