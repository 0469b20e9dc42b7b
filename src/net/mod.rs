//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind host:port)
//!     → server.rs (accept loop, one task per connection, shutdown drain)
//!     → forwarder.rs (select healthy backend, dial, count)
//!     → relay.rs (rate-limited full-duplex copy)
//!
//! Connection States (connection.rs):
//!     Accepted → BackendSelected → Dialed → Relaying → Closed
//!                      └─ no backend / dial failure → Rejected
//! ```
//!
//! # Design Decisions
//! - A failed dial closes the client; liveness is left to the health monitor
//! - Each direction gets its own token bucket
//! - Connection counts are released by guard drop, including on abort

pub mod connection;
pub mod forwarder;
pub mod listener;
pub mod relay;
pub mod server;

pub use forwarder::{ConnectionForwarder, ForwardError};
pub use relay::{RelayError, RelayStats};
pub use server::LoadBalancer;
