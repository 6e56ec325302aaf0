//! Connection registry.
//!
//! Maps identifiers to live sessions. Each operation locks a single
//! `DashMap` shard for the duration of the map access only; no lock is
//! held while a connection is read or written.

use crate::session::SessionHandle;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Identifier to session mapping with last-write-wins registration.
///
/// Entries are weak: the registry never keeps a session alive and never
/// closes a connection itself.
#[derive(Default)]
pub struct Registry {
    sessions: DashMap<String, Weak<SessionHandle>>,
    total_registrations: AtomicU64,
    displaced: AtomicU64,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under its identifier.
    ///
    /// Replaces any session registered under the same identifier and
    /// returns it, still live, so the caller can tell it to stop.
    pub fn register(&self, session: &Arc<SessionHandle>) -> Option<Arc<SessionHandle>> {
        let previous = self
            .sessions
            .insert(session.identifier().to_string(), Arc::downgrade(session));
        self.total_registrations.fetch_add(1, Ordering::Relaxed);

        let displaced = previous
            .and_then(|weak| weak.upgrade())
            .filter(|old| !Arc::ptr_eq(old, session));

        if let Some(old) = &displaced {
            self.displaced.fetch_add(1, Ordering::Relaxed);
            debug!(
                identifier = %session.identifier(),
                displaced = %old.id(),
                session = %session.id(),
                "Registration replaced an existing session"
            );
        }

        displaced
    }

    /// Find the live session registered under `identifier`.
    #[must_use]
    pub fn lookup(&self, identifier: &str) -> Option<Arc<SessionHandle>> {
        let found = self.sessions.get(identifier)?.upgrade();
        trace!(identifier = %identifier, found = found.is_some(), "Lookup");
        found
    }

    /// Remove whatever is registered under `identifier`.
    ///
    /// Returns `true` if an entry was removed.
    pub fn unregister(&self, identifier: &str) -> bool {
        self.sessions.remove(identifier).is_some()
    }

    /// Remove the entry for `session` only if it is still the registered one.
    ///
    /// A displaced session calling this leaves its successor in place.
    pub fn unregister_session(&self, session: &SessionHandle) -> bool {
        self.sessions
            .remove_if(session.identifier(), |_, weak| {
                std::ptr::eq(weak.as_ptr(), session)
            })
            .is_some()
    }

    /// Check if an identifier is registered.
    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.sessions.contains_key(identifier)
    }

    /// Number of registered identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Get registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            registered: self.sessions.len(),
            total_registrations: self.total_registrations.load(Ordering::Relaxed),
            displaced: self.displaced.load(Ordering::Relaxed),
        }
    }
}

/// Registry statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Identifiers currently registered.
    pub registered: usize,
    /// Registrations since the registry was created.
    pub total_registrations: u64,
    /// Registrations that replaced a live session.
    pub displaced: u64,
}
