//! Full-duplex byte relay under rate limiting.
//!
//! # Responsibilities
//! - Copy client → backend and backend → client concurrently
//! - Throttle each direction with its own token bucket
//! - Propagate end-of-stream as a half-close
//! - Stop both directions when either hits a genuine I/O error

use std::fmt;
use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::rate_limit::TokenBucket;

/// Direction of a relay half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client → backend.
    Upstream,
    /// Backend → client.
    Downstream,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upstream => "upstream",
            Self::Downstream => "downstream",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A genuine I/O failure in one direction. End-of-stream is not an error.
#[derive(Debug, thiserror::Error)]
#[error("{direction} relay failed: {source}")]
pub struct RelayError {
    pub direction: Direction,
    #[source]
    pub source: io::Error,
}

/// Bytes moved in each direction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub upstream_bytes: u64,
    pub downstream_bytes: u64,
}

/// Copy `reader` into `writer` until end-of-stream, taking one token per byte
/// from `limiter` before each write. The writer is shut down at EOF so the far
/// side sees the half-close.
pub async fn copy_throttled<R, W>(
    reader: &mut R,
    writer: &mut W,
    limiter: &TokenBucket,
    buffer_size: usize,
    transferred: &mut u64,
) -> io::Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; buffer_size];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        limiter.acquire(n).await;
        writer.write_all(&buf[..n]).await?;
        *transferred += n as u64;
    }

    match writer.shutdown().await {
        Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
        _ => Ok(()),
    }
}

/// Relay between `client` and `backend` until both directions finish or one fails.
///
/// Each direction is limited to `rate_mb_per_s` independently. Reads never
/// exceed one burst of the limiter. Both streams are dropped, and so closed,
/// when this returns.
pub async fn relay<C, B>(
    client: C,
    backend: B,
    rate_mb_per_s: f64,
    buffer_size: usize,
) -> (RelayStats, Option<RelayError>)
where
    C: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut backend_read, mut backend_write) = tokio::io::split(backend);

    let upstream_limiter = TokenBucket::from_megabytes_per_sec(rate_mb_per_s);
    let downstream_limiter = TokenBucket::from_megabytes_per_sec(rate_mb_per_s);
    let buffer_size = buffer_size.min(upstream_limiter.capacity() as usize).max(1);

    let mut stats = RelayStats::default();
    let error = {
        let upstream = copy_throttled(
            &mut client_read,
            &mut backend_write,
            &upstream_limiter,
            buffer_size,
            &mut stats.upstream_bytes,
        );
        let downstream = copy_throttled(
            &mut backend_read,
            &mut client_write,
            &downstream_limiter,
            buffer_size,
            &mut stats.downstream_bytes,
        );
        tokio::pin!(upstream, downstream);

        let mut upstream_done = false;
        let mut downstream_done = false;
        let mut error = None;

        while !(upstream_done && downstream_done) {
            let (direction, result) = tokio::select! {
                result = &mut upstream, if !upstream_done => {
                    upstream_done = true;
                    (Direction::Upstream, result)
                }
                result = &mut downstream, if !downstream_done => {
                    downstream_done = true;
                    (Direction::Downstream, result)
                }
            };

            if let Err(source) = result {
                // Dropping the other half's future ends that direction too.
                error = Some(RelayError { direction, source });
                break;
            }
            tracing::trace!(%direction, "Relay direction finished");
        }
        error
    };

    (stats, error)
}
