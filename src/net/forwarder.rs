//! Per-connection forwarding.
//!
//! # Responsibilities
//! - Pick a healthy backend for each accepted client
//! - Dial it, count the connection, relay bytes under the rate limit
//! - Close the client immediately when nothing can serve it

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tracing::Instrument;

use crate::config::BalancerConfig;
use crate::health::HealthMonitor;
use crate::load_balancer::{Backend, BackendSelector, SelectError};
use crate::net::connection::{ConnectionId, ConnectionState};
use crate::net::relay::{self, RelayStats};
use crate::observability::metrics;

/// Why a client could not be connected to a backend.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error(transparent)]
    NoBackend(#[from] SelectError),

    #[error("failed to connect to backend {backend}: {source}")]
    Dial {
        backend: String,
        #[source]
        source: io::Error,
    },
}

impl ForwardError {
    /// Outcome label for `lb_connections_total`.
    fn outcome(&self) -> &'static str {
        match self {
            ForwardError::NoBackend(_) => "no_backend",
            ForwardError::Dial { .. } => "dial_failed",
        }
    }
}

/// Connects accepted clients to backends.
pub struct ConnectionForwarder {
    monitor: Arc<HealthMonitor>,
    selector: Arc<BackendSelector>,
    rate: f64,
    buffer_size: usize,
}

impl ConnectionForwarder {
    /// `rate` is megabytes per second per direction.
    pub fn new(
        monitor: Arc<HealthMonitor>,
        selector: Arc<BackendSelector>,
        rate: f64,
        buffer_size: usize,
    ) -> Self {
        Self {
            monitor,
            selector,
            rate,
            buffer_size,
        }
    }

    pub fn from_config(
        monitor: Arc<HealthMonitor>,
        selector: Arc<BackendSelector>,
        config: &BalancerConfig,
    ) -> Self {
        Self::new(monitor, selector, config.rate, config.relay.buffer_size)
    }

    /// Serve one client connection to completion and return its final state.
    ///
    /// Never fails: every error is logged and ends in `Rejected` or `Closed`,
    /// with both sockets closed on return.
    pub async fn handle(&self, client: TcpStream) -> ConnectionState {
        let id = ConnectionId::new();
        let peer = match client.peer_addr() {
            Ok(addr) => Some(addr),
            Err(e) => {
                tracing::warn!(connection_id = %id, error = %e, "Failed to read client address");
                None
            }
        };
        let client_label = peer.map(|p| p.to_string()).unwrap_or_else(|| "unknown".into());

        let span = tracing::info_span!("connection", id = %id, peer = %client_label);
        self.forward(client, peer, &client_label).instrument(span).await
    }

    async fn forward(
        &self,
        client: TcpStream,
        peer: Option<SocketAddr>,
        client_label: &str,
    ) -> ConnectionState {
        tracing::trace!(state = %ConnectionState::Accepted, "Client accepted");

        let client_ip = peer.map(|p| p.ip().to_string());
        let (backend, upstream) = match self.connect(client_ip.as_deref()).await {
            Ok(connected) => connected,
            Err(e) => {
                tracing::warn!(error = %e, "Rejecting connection");
                metrics::record_connection(e.outcome());
                // Dropping the client stream closes it.
                drop(client);
                return ConnectionState::Rejected;
            }
        };

        let _guard = self.selector.track(Arc::clone(&backend));
        tracing::trace!(
            backend = %backend.address(),
            active = self.selector.active_connections(backend.address()),
            state = %ConnectionState::Relaying,
            "Relaying"
        );

        let (stats, error) = relay::relay(client, upstream, self.rate, self.buffer_size).await;
        if let Some(e) = &error {
            tracing::warn!(backend = %backend.address(), error = %e, "Relay aborted");
        }
        record_stats(&stats);
        metrics::record_connection("relayed");

        tracing::info!(
            client = %client_label,
            backend = %backend.address(),
            upstream_bytes = stats.upstream_bytes,
            downstream_bytes = stats.downstream_bytes,
            state = %ConnectionState::Closed,
            "Connection closed"
        );
        ConnectionState::Closed
    }

    /// Select a backend from the current healthy snapshot and dial it.
    async fn connect(
        &self,
        client_ip: Option<&str>,
    ) -> Result<(Arc<Backend>, TcpStream), ForwardError> {
        let healthy = self.monitor.healthy_backends();
        let backend = self.selector.select(&healthy, client_ip)?;
        tracing::trace!(
            backend = %backend.address(),
            algorithm = %self.selector.algorithm(),
            healthy = healthy.len(),
            state = %ConnectionState::BackendSelected,
            "Backend selected"
        );

        // Only the liveness flag gates selection; a dial failure here does not
        // mark the backend dead, the next probe round does that.
        let upstream = TcpStream::connect(backend.address())
            .await
            .map_err(|source| ForwardError::Dial {
                backend: backend.address().to_string(),
                source,
            })?;
        tracing::trace!(backend = %backend.address(), state = %ConnectionState::Dialed, "Backend dialed");

        Ok((backend, upstream))
    }
}

fn record_stats(stats: &RelayStats) {
    metrics::record_relayed_bytes("upstream", stats.upstream_bytes);
    metrics::record_relayed_bytes("downstream", stats.downstream_bytes);
}
