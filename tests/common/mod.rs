//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use tcp_balancer::config::ListenerConfig;
use tcp_balancer::{BalancerConfig, LoadBalancer, Shutdown};

/// An echo server on an ephemeral loopback port that counts accepted connections.
pub struct EchoBackend {
    pub addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
}

impl EchoBackend {
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

/// Start an echo backend on `127.0.0.1:0`.
pub async fn start_echo_backend() -> EchoBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    serve_echo(listener)
}

/// Start an echo backend on a specific address, e.g. one freed by [`dead_address`].
pub async fn start_echo_backend_on(addr: SocketAddr) -> EchoBackend {
    let listener = TcpListener::bind(addr).await.unwrap();
    serve_echo(listener)
}

fn serve_echo(listener: TcpListener) -> EchoBackend {
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let (mut reader, mut writer) = socket.into_split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
                let _ = writer.shutdown().await;
            });
        }
    });

    EchoBackend { addr, accepted }
}

/// An address nothing listens on.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A config bound to an ephemeral loopback port with a long probe interval.
pub fn test_config(backends: Vec<String>, algorithm: &str) -> BalancerConfig {
    let mut config = BalancerConfig {
        port: 0,
        algorithm: algorithm.to_string(),
        backends,
        listener: ListenerConfig {
            bind_host: "127.0.0.1".into(),
        },
        ..BalancerConfig::default()
    };
    config.health_check.interval_secs = 60;
    config.health_check.timeout_secs = 1;
    config.shutdown.drain_timeout_secs = 5;
    config
}

pub struct RunningBalancer {
    pub addr: SocketAddr,
    pub balancer: Arc<LoadBalancer>,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<io::Result<()>>,
}

impl RunningBalancer {
    /// Trigger shutdown and wait for the accept loop and drain to finish.
    pub async fn stop(self) -> io::Result<()> {
        self.shutdown.trigger();
        self.handle.await.unwrap()
    }
}

/// Build a balancer from `config` and run it on an ephemeral port.
pub async fn start_balancer(config: BalancerConfig) -> RunningBalancer {
    let listener = TcpListener::bind(config.bind_address()).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let balancer = Arc::new(LoadBalancer::new(&config));
    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();

    let handle = {
        let balancer = Arc::clone(&balancer);
        tokio::spawn(async move { balancer.run(listener, shutdown_rx).await })
    };

    RunningBalancer {
        addr,
        balancer,
        shutdown,
        handle,
    }
}

/// Send `payload` through the balancer, half-close, and collect the reply.
pub async fn round_trip(addr: SocketAddr, payload: &[u8]) -> io::Result<Vec<u8>> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(payload).await?;
    stream.shutdown().await?;

    let mut reply = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut reply))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "no reply within 5s"))??;
    Ok(reply)
}
