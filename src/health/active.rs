//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every backend with a bounded TCP connect
//! - Update backend liveness based on results
//! - Serve healthy snapshots to the selector

use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::health::state::{self, HealthSnapshot, Transition};
use crate::load_balancer::{Backend, BackendPool};
use crate::observability::metrics;

/// Why a single probe failed. Never leaves the monitor.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    #[error("connect failed: {0}")]
    Connect(#[from] io::Error),
}

/// Attempt a TCP connection to `address` within `timeout`.
pub async fn check(address: &str, timeout: Duration) -> Result<(), ProbeError> {
    match time::timeout(timeout, TcpStream::connect(address)).await {
        Ok(Ok(_stream)) => Ok(()),
        Ok(Err(e)) => Err(ProbeError::Connect(e)),
        Err(_) => Err(ProbeError::Timeout(timeout)),
    }
}

struct ProbeTask {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns backend liveness and the recurring probe task.
pub struct HealthMonitor {
    pool: Arc<BackendPool>,
    interval: Duration,
    timeout: Duration,
    task: Mutex<Option<ProbeTask>>,
}

impl HealthMonitor {
    /// `interval` is the pause between the end of one round and the start of
    /// the next; `timeout` bounds each individual probe.
    pub fn new(pool: Arc<BackendPool>, interval: Duration, timeout: Duration) -> Self {
        Self {
            pool,
            interval,
            timeout,
            task: Mutex::new(None),
        }
    }

    pub fn from_config(pool: Arc<BackendPool>, config: &HealthCheckConfig) -> Self {
        Self::new(pool, config.interval(), config.timeout())
    }

    pub fn pool(&self) -> &Arc<BackendPool> {
        &self.pool
    }

    /// Start the recurring probe task. Calling it while already running does nothing.
    pub fn start(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.is_some() {
            tracing::debug!("Health monitor already running");
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let pool = Arc::clone(&self.pool);
        let (interval, timeout) = (self.interval, self.timeout);

        tracing::info!(
            interval = ?interval,
            timeout = ?timeout,
            backends = pool.len(),
            "Health monitor starting"
        );

        let handle = tokio::spawn(run(pool, interval, timeout, shutdown_rx));
        *task = Some(ProbeTask {
            shutdown_tx,
            handle,
        });
    }

    /// Stop the probe task, waiting for an in-flight round to finish.
    pub async fn stop(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(task) = task else {
            return;
        };

        let _ = task.shutdown_tx.send(true);
        if let Err(e) = task.handle.await {
            tracing::error!(error = %e, "Health monitor task failed");
        }
        tracing::info!("Health monitor stopped");
    }

    /// Probe one backend and record the result.
    pub async fn probe(&self, backend: &Backend) -> Option<Transition> {
        probe_backend(backend, self.timeout).await
    }

    /// Run a single probe round over every backend concurrently.
    pub async fn probe_all(&self) {
        probe_round(&self.pool, self.timeout).await;
    }

    /// Alive backends in configured order, read fresh on every call.
    pub fn healthy_backends(&self) -> HealthSnapshot {
        HealthSnapshot::new(
            self.pool
                .all()
                .iter()
                .filter(|b| b.is_alive())
                .cloned()
                .collect(),
        )
    }
}

async fn run(
    pool: Arc<BackendPool>,
    interval: Duration,
    timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        // The round runs to completion before the next sleep begins, so rounds
        // never overlap and shutdown is only observed between rounds.
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = time::sleep(interval) => {}
        }
        probe_round(&pool, timeout).await;
    }
    tracing::debug!("Health monitor received shutdown signal, exiting loop");
}

async fn probe_round(pool: &BackendPool, timeout: Duration) {
    let mut probes = JoinSet::new();
    for backend in pool.all() {
        let backend = Arc::clone(backend);
        probes.spawn(async move { probe_backend(&backend, timeout).await });
    }

    while let Some(result) = probes.join_next().await {
        if let Err(e) = result {
            tracing::error!(error = %e, "Probe task failed");
        }
    }

    let healthy = pool.all().iter().filter(|b| b.is_alive()).count();
    tracing::debug!(healthy, total = pool.len(), "Health check round complete");
}

async fn probe_backend(backend: &Backend, timeout: Duration) -> Option<Transition> {
    let result = check(backend.address(), timeout).await;
    let transition = state::record(backend, result.is_ok());

    match (&result, transition) {
        (Err(e), Some(Transition::Down)) => {
            tracing::warn!(backend = %backend.address(), error = %e, "Backend is DOWN");
        }
        (_, Some(Transition::Up)) => {
            tracing::info!(backend = %backend.address(), "Backend is UP");
        }
        (Err(e), None) => {
            tracing::trace!(backend = %backend.address(), error = %e, "Backend still down");
        }
        _ => {}
    }

    metrics::record_backend_health(backend.address(), backend.is_alive());
    transition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::logging::capture;
    use tokio::net::TcpListener;

    async fn dead_address() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr.to_string()
    }

    fn monitor(addresses: Vec<String>) -> HealthMonitor {
        HealthMonitor::new(
            Arc::new(BackendPool::new(addresses)),
            Duration::from_millis(50),
            Duration::from_millis(500),
        )
    }

    #[tokio::test]
    async fn all_backends_start_healthy() {
        let monitor = monitor(vec!["a:1".into(), "b:2".into()]);
        assert_eq!(monitor.healthy_backends().addresses(), vec!["a:1", "b:2"]);
    }

    #[tokio::test]
    async fn failed_probe_marks_dead_and_success_revives() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let live = listener.local_addr().unwrap().to_string();
        let dead = dead_address().await;
        let monitor = monitor(vec![live.clone(), dead.clone()]);

        let backend = monitor
            .pool()
            .all()
            .iter()
            .find(|b| b.address() == dead)
            .cloned()
            .unwrap();
        assert_eq!(monitor.probe(&backend).await, Some(Transition::Down));
        assert_eq!(monitor.probe(&backend).await, None);
        assert_eq!(monitor.probe(&backend).await, None);
        assert_eq!(monitor.healthy_backends().addresses(), vec![live.as_str()]);

        // Bring the dead backend up on its old port.
        let _revived = TcpListener::bind(&dead).await.unwrap();
        assert_eq!(monitor.probe(&backend).await, Some(Transition::Up));
        assert_eq!(monitor.probe(&backend).await, None);
        assert_eq!(monitor.healthy_backends().len(), 2);
    }

    #[tokio::test]
    async fn probe_round_keeps_configured_order() {
        let l1 = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let l3 = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let a1 = l1.local_addr().unwrap().to_string();
        let a2 = dead_address().await;
        let a3 = l3.local_addr().unwrap().to_string();

        let monitor = monitor(vec![a1.clone(), a2, a3.clone()]);
        monitor.probe_all().await;

        assert_eq!(
            monitor.healthy_backends().addresses(),
            vec![a1.as_str(), a3.as_str()]
        );
    }

    #[tokio::test]
    async fn each_flip_is_logged_once() {
        let (logs, _guard) = capture::install();
        let dead = dead_address().await;
        let monitor = monitor(vec![dead.clone()]);

        for _ in 0..3 {
            monitor.probe_all().await;
        }
        assert_eq!(logs.lines_with("Backend is DOWN"), 1);
        assert_eq!(logs.lines_with("Backend is UP"), 0);

        let _revived = TcpListener::bind(&dead).await.unwrap();
        for _ in 0..3 {
            monitor.probe_all().await;
        }
        assert_eq!(logs.lines_with("Backend is DOWN"), 1);
        assert_eq!(logs.lines_with("Backend is UP"), 1);
    }

    #[tokio::test]
    async fn all_dead_yields_empty_snapshot() {
        let monitor = monitor(vec![dead_address().await, dead_address().await]);
        monitor.probe_all().await;
        assert!(monitor.healthy_backends().is_empty());
    }

    #[tokio::test]
    async fn background_task_probes_and_stops() {
        let dead = dead_address().await;
        let monitor = monitor(vec![dead]);

        monitor.start();
        monitor.start();
        time::sleep(Duration::from_millis(300)).await;
        assert!(monitor.healthy_backends().is_empty());

        monitor.stop().await;
        assert!(monitor.task.lock().unwrap().is_none());

        // Stopping twice is harmless.
        monitor.stop().await;
    }

    #[tokio::test]
    async fn check_reports_refused_connection() {
        let err = check(&dead_address().await, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Connect(_)));
    }
}
