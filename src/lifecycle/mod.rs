//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → accept loop stops → monitor stops → drain connections → exit
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, stop probing, drain, close
//! - Drain has a deadline; connections still open after it are aborted

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::{spawn_signal_listener, wait_for_signal, Signal};
