//! Layer-4 TCP load balancer library.
//!
//! Accepts client TCP connections, picks a healthy backend with a configured
//! strategy, and relays bytes both ways under a per-direction rate limit.

pub mod config;
pub mod health;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod rate_limit;

pub use config::schema::BalancerConfig;
pub use health::{HealthMonitor, HealthSnapshot};
pub use lifecycle::Shutdown;
pub use load_balancer::{Algorithm, BackendSelector};
pub use net::{ConnectionForwarder, LoadBalancer};
pub use rate_limit::TokenBucket;
