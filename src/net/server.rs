//! The load balancer: accept loop, health monitor, and shutdown drain.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time;

use crate::config::BalancerConfig;
use crate::health::{HealthMonitor, HealthSnapshot};
use crate::load_balancer::{BackendPool, BackendSelector};
use crate::net::forwarder::ConnectionForwarder;

/// Back-off after a failed accept, so a persistent error (e.g. fd exhaustion)
/// does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// A Layer-4 load balancer over a fixed backend pool.
pub struct LoadBalancer {
    monitor: Arc<HealthMonitor>,
    selector: Arc<BackendSelector>,
    forwarder: Arc<ConnectionForwarder>,
    drain_timeout: Duration,
}

impl LoadBalancer {
    /// Build every component from a validated config. Nothing runs until [`run`].
    ///
    /// [`run`]: LoadBalancer::run
    pub fn new(config: &BalancerConfig) -> Self {
        let pool = Arc::new(BackendPool::new(config.backends.iter().cloned()));
        let monitor = Arc::new(HealthMonitor::from_config(pool, &config.health_check));
        let selector = Arc::new(BackendSelector::new(config.algorithm()));
        let forwarder = Arc::new(ConnectionForwarder::from_config(
            Arc::clone(&monitor),
            Arc::clone(&selector),
            config,
        ));

        Self {
            monitor,
            selector,
            forwarder,
            drain_timeout: config.shutdown.drain_timeout(),
        }
    }

    pub fn monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    pub fn selector(&self) -> &Arc<BackendSelector> {
        &self.selector
    }

    /// Alive backends right now, in configured order.
    pub fn healthy_backends(&self) -> HealthSnapshot {
        self.monitor.healthy_backends()
    }

    /// Accept on `listener` until `shutdown` fires.
    ///
    /// Starts the health monitor, serves every connection on its own task, and
    /// on shutdown closes the listener, stops the monitor, and waits up to the
    /// drain timeout for open connections before aborting the rest.
    pub async fn run(
        &self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> io::Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!(
            address = %local_addr,
            algorithm = %self.selector.algorithm(),
            backends = self.monitor.pool().len(),
            "Load balancer listening"
        );

        if self.monitor.pool().is_empty() {
            tracing::warn!("No backends configured, every connection will be rejected");
        }
        self.monitor.start();

        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, closing listener");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!(peer = %peer, "Connection accepted");
                        let forwarder = Arc::clone(&self.forwarder);
                        connections.spawn(async move {
                            forwarder.handle(stream).await;
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Accept error");
                        time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = finished {
                        tracing::error!(error = %e, "Connection task failed");
                    }
                }
            }
        }

        drop(listener);
        self.monitor.stop().await;
        self.drain(connections).await;

        tracing::info!("Load balancer stopped");
        Ok(())
    }

    async fn drain(&self, mut connections: JoinSet<()>) {
        if connections.is_empty() {
            return;
        }

        tracing::info!(
            in_flight = connections.len(),
            timeout = ?self.drain_timeout,
            "Draining connections"
        );

        let drained = time::timeout(self.drain_timeout, async {
            while let Some(finished) = connections.join_next().await {
                if let Err(e) = finished {
                    tracing::error!(error = %e, "Connection task failed");
                }
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                remaining = connections.len(),
                "Drain timeout elapsed, closing remaining connections"
            );
            // Aborted tasks drop their guards, so counts still return to zero.
            connections.shutdown().await;
        }
    }
}
