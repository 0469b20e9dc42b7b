//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Connection accepted
//!     → health monitor produces a HealthSnapshot (alive backends, configured order)
//!     → selector.rs applies the configured algorithm:
//!         - round_robin.rs (cursor over the healthy sequence)
//!         - least_conn.rs (fewest active connections, first wins ties)
//!         - hashing.rs (FNV-1a of client IP modulo healthy count)
//!     → selector.track() returns a ConnectionGuard after a successful dial
//!     → guard dropped when the connection ends
//! ```
//!
//! # Design Decisions
//! - Strategies are a closed enum; unknown names fall back to round-robin
//! - Cursor and connection counts share one lock; liveness flags do not
//! - Unhealthy backends are excluded from selection, not deprioritised
//! - The backend set is static; pool.rs builds it once

pub mod backend;
pub mod hashing;
pub mod least_conn;
pub mod pool;
pub mod round_robin;
pub mod selector;

pub use backend::Backend;
pub use pool::BackendPool;
pub use selector::{Algorithm, BackendSelector, ConnectionGuard, SelectError, SelectorState};
