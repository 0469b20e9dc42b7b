//! Least Connections load balancing strategy.

use std::collections::HashMap;
use std::sync::Arc;

use crate::load_balancer::backend::Backend;

/// Index of the healthy backend with the fewest active connections.
///
/// Only backends in `healthy` are compared. In case of tie, the first one in
/// configured order is selected (stability).
pub fn min_index(healthy: &[Arc<Backend>], counts: &HashMap<String, usize>) -> Option<usize> {
    healthy
        .iter()
        .enumerate()
        .min_by_key(|(_, b)| counts.get(b.address()).copied().unwrap_or(0))
        .map(|(index, _)| index)
}
