//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges via the metrics facade)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Whatever recorder the embedding process installs
//! ```
//!
//! # Design Decisions
//! - Liveness flips, rejections, dial failures and closes are always logged
//! - Each connection runs in its own span carrying its id and peer
//! - Metrics are cheap (atomic increments) and have no endpoint here

pub mod logging;
pub mod metrics;
