//! Backend liveness state.
//!
//! # States
//! - Alive: backend is eligible for selection
//! - Dead: backend excluded from selection until a probe succeeds
//!
//! # State Transitions
//! ```text
//! Alive → Dead: any failed probe
//! Dead → Alive: any successful probe
//! ```
//!
//! A transition is reported exactly once per flip; repeating the current
//! state reports nothing.

use std::sync::Arc;

use crate::load_balancer::Backend;

/// A liveness flip observed while recording a probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Dead → alive.
    Up,
    /// Alive → dead.
    Down,
}

/// Store a probe result on `backend`, returning the flip it caused, if any.
pub fn record(backend: &Backend, alive: bool) -> Option<Transition> {
    let was_alive = backend.set_alive(alive);
    match (was_alive, alive) {
        (false, true) => Some(Transition::Up),
        (true, false) => Some(Transition::Down),
        _ => None,
    }
}

/// The backends considered alive at one moment, in configured order.
///
/// Produced fresh for every selection and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct HealthSnapshot {
    backends: Vec<Arc<Backend>>,
}

impl HealthSnapshot {
    pub fn new(backends: Vec<Arc<Backend>>) -> Self {
        Self { backends }
    }

    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    /// Addresses of the alive backends.
    pub fn addresses(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.address()).collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_each_flip_once() {
        let backend = Backend::new("127.0.0.1:9000");

        assert_eq!(record(&backend, true), None);
        assert_eq!(record(&backend, false), Some(Transition::Down));
        assert_eq!(record(&backend, false), None);
        assert_eq!(record(&backend, false), None);
        assert_eq!(record(&backend, true), Some(Transition::Up));
        assert_eq!(record(&backend, true), None);
    }
}
