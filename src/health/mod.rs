//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Sleep one interval
//!     → Probe every backend concurrently (TCP connect, bounded timeout)
//!     → Wait for the whole round
//!     → Update state.rs, log flips
//!     → Sleep again
//!
//! Selection:
//!     healthy_backends() → HealthSnapshot (alive backends, configured order)
//! ```
//!
//! # Design Decisions
//! - Optimistic start: every backend is alive until a probe says otherwise
//! - One probe decides: success marks alive, any error marks dead
//! - Health state is per-backend, with no lock shared across backends
//! - Snapshots may be up to one interval stale

pub mod active;
pub mod state;

pub use active::{HealthMonitor, ProbeError};
pub use state::{HealthSnapshot, Transition};
