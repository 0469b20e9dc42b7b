//! Connection identity and lifecycle states.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Name the states a client connection moves through

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle of one client connection.
///
/// ```text
/// Accepted → BackendSelected → Dialed → Relaying → Closed
///     └──────────┴─────────────→ Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Client socket accepted.
    Accepted,
    /// A healthy backend was chosen.
    BackendSelected,
    /// Backend dial succeeded and the connection is counted.
    Dialed,
    /// Bytes are flowing in both directions.
    Relaying,
    /// Both directions finished and both sockets are closed.
    Closed,
    /// No backend was available or the dial failed; the client was closed.
    Rejected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::BackendSelected => "backend_selected",
            Self::Dialed => "dialed",
            Self::Relaying => "relaying",
            Self::Closed => "closed",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id1.to_string().starts_with("conn-"));
    }

    #[test]
    fn state_names() {
        assert_eq!(ConnectionState::Rejected.to_string(), "rejected");
        assert_eq!(ConnectionState::BackendSelected.to_string(), "backend_selected");
    }
}
