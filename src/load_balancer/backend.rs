//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream TCP service
//! - Hold its liveness flag (written only by the health monitor)
//! - Mirror its active connection count (written only under the selector lock)

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A single backend server.
///
/// Each backend carries its own atomic liveness flag, so reading one backend's
/// state never waits on a probe writing another's.
#[derive(Debug)]
pub struct Backend {
    address: String,
    alive: AtomicBool,
    active_connections: AtomicUsize,
}

impl Backend {
    /// Create a new backend. Backends start alive so traffic is not withheld
    /// while the first probe round is pending.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            alive: AtomicBool::new(true),
            active_connections: AtomicUsize::new(0),
        }
    }

    /// The `host:port` this backend is dialed at.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Store a new liveness value and return the previous one.
    pub(crate) fn set_alive(&self, alive: bool) -> bool {
        self.alive.swap(alive, Ordering::AcqRel)
    }

    /// Get the current number of active connections.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub(crate) fn store_active_connections(&self, count: usize) {
        self.active_connections.store(count, Ordering::Relaxed);
    }
}
