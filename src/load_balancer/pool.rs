//! Backend pool management.
//!
//! # Responsibilities
//! - Build the fixed, ordered set of backends from configuration
//! - Hand out shared references for probing and selection

use std::sync::Arc;

use crate::load_balancer::backend::Backend;

/// The static set of backends, in configured order.
///
/// Constructed once at startup and never resized; only the backends'
/// own mutable fields change afterwards.
#[derive(Debug)]
pub struct BackendPool {
    backends: Vec<Arc<Backend>>,
}

impl BackendPool {
    /// Create a pool from `host:port` addresses.
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backends = addresses
            .into_iter()
            .map(|address| Arc::new(Backend::new(address)))
            .collect();
        Self { backends }
    }

    /// All backends, in configured order.
    pub fn all(&self) -> &[Arc<Backend>] {
        &self.backends
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
    fn preserves_configured_order() {
        let pool = BackendPool::new(["b:2", "a:1", "c:3"]);
        let order: Vec<_> = pool.all().iter().map(|b| b.address()).collect();
        assert_eq!(order, vec!["b:2", "a:1", "c:3"]);
        assert_eq!(pool.len(), 3);
        assert!(!pool.is_empty());
    }
}
