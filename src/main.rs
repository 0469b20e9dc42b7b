//! TCP load balancer (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────────┐
//!                    │                  LOAD BALANCER                    │
//!                    │                                                   │
//!   Client ──────────┼─▶ listener ─▶ server ─▶ forwarder ─▶ selector     │
//!                    │                 │           │            ▲        │
//!                    │                 │           ▼            │        │
//!   Client ◀─────────┼──────────── relay (rate limited) ◀──▶ Backend ────┼── Backend
//!                    │                                          ▲        │
//!                    │                          health monitor ─┘        │
//!                    │                         (periodic TCP probes)     │
//!                    └───────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use tcp_balancer::config::{loader, ObservabilityConfig};
use tcp_balancer::lifecycle::{self, Shutdown};
use tcp_balancer::net::listener;
use tcp_balancer::observability::logging;
use tcp_balancer::LoadBalancer;

#[derive(Debug, Parser)]
#[command(name = "tcp-balancer", version, about = "Layer-4 TCP load balancer")]
struct Cli {
    /// Path to a TOML config file. `LB_*` environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Load and validate the configuration, then exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match loader::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            // The configured log settings are unavailable, so report with defaults.
            logging::init(&ObservabilityConfig::default())?;
            tracing::error!(error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };

    logging::init(&config.observability)?;

    tracing::info!(
        port = config.port,
        algorithm = %config.algorithm(),
        backends = ?config.backends,
        rate_mb_per_s = config.rate,
        health_interval_secs = config.health_check.interval_secs,
        "Configuration loaded"
    );

    if cli.check {
        tracing::info!("Configuration OK");
        return Ok(());
    }

    let (listener, _) = listener::bind(&config).await?;

    let shutdown = Arc::new(Shutdown::new());
    let shutdown_rx = shutdown.subscribe();
    lifecycle::spawn_signal_listener(Arc::clone(&shutdown));

    let balancer = LoadBalancer::new(&config);
    balancer.run(listener, shutdown_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
