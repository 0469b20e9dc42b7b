//! Throughput limiting subsystem.
//!
//! # Data Flow
//! ```text
//! relay reads N bytes from its source
//!     → bucket.acquire(N) waits until N tokens are available
//!     → bytes are written to the destination
//! ```
//!
//! # Design Decisions
//! - One token per byte; `rate` MB/s becomes `rate × 1024 × 1024` tokens/s
//! - Burst capacity is one second of tokens
//! - Every direction of every connection gets its own bucket; the two
//!   directions never share a budget

pub mod bucket;

pub use bucket::TokenBucket;
