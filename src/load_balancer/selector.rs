//! Backend selection and connection accounting.
//!
//! # Responsibilities
//! - Dispatch to the configured strategy over a healthy snapshot
//! - Own the round-robin cursor and the per-backend connection counts
//! - Hand out guards that decrement the count on every exit path

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::health::HealthSnapshot;
use crate::load_balancer::backend::Backend;
use crate::load_balancer::{hashing, least_conn, round_robin};
use crate::observability::metrics;

/// Selection strategy, fixed for the life of the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Algorithm {
    #[default]
    RoundRobin,
    LeastConnections,
    Hashing,
}

impl Algorithm {
    /// Parse a configured strategy name. Returns `None` for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "roundrobin" | "" => Some(Self::RoundRobin),
            "leastconn" => Some(Self::LeastConnections),
            "hashing" => Some(Self::Hashing),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::RoundRobin => "roundrobin",
            Self::LeastConnections => "leastconn",
            Self::Hashing => "hashing",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when the healthy snapshot offers nothing to choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    #[error("no backend available")]
    NoBackendAvailable,
}

/// State shared by the stateful strategies.
///
/// The cursor and the counts live behind one lock: they are always read or
/// written together per selection or accounting event.
#[derive(Debug, Default)]
pub struct SelectorState {
    /// Next index into the current healthy sequence.
    pub round_robin_cursor: usize,
    /// Active connections per backend address.
    pub connection_counts: HashMap<String, usize>,
}

/// Picks one backend per connection.
#[derive(Debug)]
pub struct BackendSelector {
    algorithm: Algorithm,
    state: Mutex<SelectorState>,
}

impl BackendSelector {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            state: Mutex::new(SelectorState::default()),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Select a backend from `healthy`.
    ///
    /// `client_ip` only matters for hashing; a missing address hashes as the
    /// empty string so the choice stays deterministic.
    pub fn select(
        &self,
        healthy: &HealthSnapshot,
        client_ip: Option<&str>,
    ) -> Result<Arc<Backend>, SelectError> {
        let backends = healthy.backends();
        let index = match self.algorithm {
            Algorithm::RoundRobin => {
                let mut state = self.lock();
                round_robin::next_index(&mut state.round_robin_cursor, backends.len())
            }
            Algorithm::LeastConnections => {
                let state = self.lock();
                least_conn::min_index(backends, &state.connection_counts)
            }
            Algorithm::Hashing => hashing::index_for(client_ip.unwrap_or(""), backends.len()),
        };

        index
            .and_then(|i| backends.get(i))
            .cloned()
            .ok_or(SelectError::NoBackendAvailable)
    }

    /// Count a new connection to `backend`.
    /// Returns a guard that decrements the count on drop.
    pub fn track(self: &Arc<Self>, backend: Arc<Backend>) -> ConnectionGuard {
        {
            let mut state = self.lock();
            let count = state
                .connection_counts
                .entry(backend.address().to_string())
                .or_insert(0);
            *count += 1;
            backend.store_active_connections(*count);
        }
        metrics::connection_opened();
        ConnectionGuard {
            selector: Arc::clone(self),
            backend,
        }
    }

    /// Active connections currently counted for `address`.
    pub fn active_connections(&self, address: &str) -> usize {
        self.lock()
            .connection_counts
            .get(address)
            .copied()
            .unwrap_or(0)
    }

    fn release(&self, backend: &Backend) {
        let mut state = self.lock();
        if let Some(count) = state.connection_counts.get_mut(backend.address()) {
            *count = count.saturating_sub(1);
            backend.store_active_connections(*count);
        }
        metrics::connection_closed();
    }

    // A panic while holding the lock cannot leave the counts half-written,
    // so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, SelectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A RAII guard that manages the active connection count.
#[derive(Debug)]
pub struct ConnectionGuard {
    selector: Arc<BackendSelector>,
    backend: Arc<Backend>,
}

impl ConnectionGuard {
    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.selector.release(&self.backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(addresses: &[&str]) -> HealthSnapshot {
        HealthSnapshot::new(addresses.iter().map(|a| Arc::new(Backend::new(*a))).collect())
    }

    #[test]
    fn parses_algorithm_names() {
        assert_eq!(Algorithm::from_name("roundrobin"), Some(Algorithm::RoundRobin));
        assert_eq!(Algorithm::from_name("leastconn"), Some(Algorithm::LeastConnections));
        assert_eq!(Algorithm::from_name("hashing"), Some(Algorithm::Hashing));
        assert_eq!(Algorithm::from_name(""), Some(Algorithm::RoundRobin));
        assert_eq!(Algorithm::from_name("random"), None);
    }

    #[test]
    fn empty_snapshot_is_no_backend_available() {
        for algorithm in [Algorithm::RoundRobin, Algorithm::LeastConnections, Algorithm::Hashing] {
            let selector = BackendSelector::new(algorithm);
            let result = selector.select(&HealthSnapshot::default(), Some("10.0.0.1"));
            assert_eq!(result.unwrap_err(), SelectError::NoBackendAvailable);
        }
    }

    #[test]
    fn round_robin_stays_within_healthy_set() {
        let selector = BackendSelector::new(Algorithm::RoundRobin);
        let healthy = snapshot(&["a:1", "c:3"]);
        let picks: Vec<_> = (0..4)
            .map(|_| selector.select(&healthy, None).unwrap().address().to_string())
            .collect();
        assert_eq!(picks, vec!["a:1", "c:3", "a:1", "c:3"]);
    }

    #[test]
    fn least_connections_avoids_busy_backend() {
        let selector = Arc::new(BackendSelector::new(Algorithm::LeastConnections));
        let healthy = snapshot(&["a:1", "b:2", "c:3"]);

        let first = selector.select(&healthy, None).unwrap();
        assert_eq!(first.address(), "a:1");
        let _a = selector.track(first);

        let second = selector.select(&healthy, None).unwrap();
        assert_eq!(second.address(), "b:2");
        let _b = selector.track(second);

        let third = selector.select(&healthy, None).unwrap();
        assert_eq!(third.address(), "c:3");
    }

    #[test]
    fn guard_decrements_on_drop() {
        let selector = Arc::new(BackendSelector::new(Algorithm::LeastConnections));
        let backend = Arc::new(Backend::new("a:1"));

        let g1 = selector.track(Arc::clone(&backend));
        let g2 = selector.track(Arc::clone(&backend));
        assert_eq!(selector.active_connections("a:1"), 2);
        assert_eq!(backend.active_connections(), 2);

        drop(g1);
        assert_eq!(selector.active_connections("a:1"), 1);
        assert_eq!(backend.active_connections(), 1);

        drop(g2);
        assert_eq!(selector.active_connections("a:1"), 0);
        assert_eq!(backend.active_connections(), 0);
    }

    #[test]
    fn guard_decrements_on_panic() {
        let selector = Arc::new(BackendSelector::new(Algorithm::LeastConnections));
        let backend = Arc::new(Backend::new("a:1"));

        let s = Arc::clone(&selector);
        let b = Arc::clone(&backend);
        let result = std::thread::spawn(move || {
            let _guard = s.track(b);
            panic!("connection handler failed");
        })
        .join();

        assert!(result.is_err());
        assert_eq!(selector.active_connections("a:1"), 0);
        assert_eq!(backend.active_connections(), 0);
    }

    #[test]
    fn hashing_is_deterministic_and_tolerates_missing_ip() {
        let selector = BackendSelector::new(Algorithm::Hashing);
        let healthy = snapshot(&["a:1", "b:2", "c:3"]);

        let first = selector.select(&healthy, Some("172.16.0.9")).unwrap();
        for _ in 0..5 {
            let again = selector.select(&healthy, Some("172.16.0.9")).unwrap();
            assert_eq!(again.address(), first.address());
        }

        let anonymous = selector.select(&healthy, None).unwrap();
        let expected = hashing::index_for("", 3).unwrap();
        assert_eq!(anonymous.address(), healthy.backends()[expected].address());
    }
}
