//! Client-facing TCP listener.
//!
//! # Responsibilities
//! - Bind the configured host and port
//! - Report the effective local address (port 0 resolves here)

use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::config::BalancerConfig;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to address.
    Bind {
        address: String,
        source: std::io::Error,
    },
    /// Bound, but the local address could not be read back.
    LocalAddr(std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind { address, source } => {
                write!(f, "Failed to bind {}: {}", address, source)
            }
            ListenerError::LocalAddr(e) => write!(f, "Failed to read local address: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::Bind { source, .. } => Some(source),
            ListenerError::LocalAddr(e) => Some(e),
        }
    }
}

/// Bind the listener for `config.listener.bind_host:config.port`.
pub async fn bind(config: &BalancerConfig) -> Result<(TcpListener, SocketAddr), ListenerError> {
    let address = config.bind_address();

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ListenerError::Bind {
            address: address.clone(),
            source,
        })?;

    let local_addr = listener.local_addr().map_err(ListenerError::LocalAddr)?;

    tracing::info!(address = %local_addr, "Listener bound");
    Ok((listener, local_addr))
}
