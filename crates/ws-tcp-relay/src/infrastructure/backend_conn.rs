//! TCP connection to the backend.
//!
//! Each browser session gets its own TCP connection to the backend.  The
//! backend never learns that a browser is on the other end: it sees an
//! ordinary TCP client sending and receiving length-prefixed frames.

use std::time::Duration;

use async_trait::async_trait;
use relay_core::FrameLayout;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::application::{BackendDialer, RelayError};
use crate::infrastructure::frame_io::{StreamFrameSink, StreamFrameSource};

/// Backend frames read from the TCP read half.
pub type BackendSource = StreamFrameSource<OwnedReadHalf>;

/// Backend frames written to the TCP write half.
pub type BackendSink = StreamFrameSink<OwnedWriteHalf>;

/// Dials the configured backend address with a bounded connect timeout.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use relay_core::FrameLayout;
/// use ws_tcp_relay::application::BackendDialer;
/// use ws_tcp_relay::infrastructure::backend_conn::TcpDialer;
///
/// # async fn example() -> Result<(), ws_tcp_relay::application::RelayError> {
/// let dialer = TcpDialer::new("127.0.0.1:7788", Duration::from_secs(2), FrameLayout::default());
/// let (_source, _sink) = dialer.dial().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TcpDialer {
    addr: String,
    connect_timeout: Duration,
    layout: FrameLayout,
}

impl TcpDialer {
    pub fn new(addr: impl Into<String>, connect_timeout: Duration, layout: FrameLayout) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout,
            layout,
        }
    }
}

#[async_trait]
impl BackendDialer for TcpDialer {
    type Source = BackendSource;
    type Sink = BackendSink;

    async fn dial(&self) -> Result<(BackendSource, BackendSink), RelayError> {
        let stream = match timeout(self.connect_timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(RelayError::Dial {
                    addr: self.addr.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(RelayError::DialTimeout {
                    addr: self.addr.clone(),
                    timeout: self.connect_timeout,
                })
            }
        };

        // Frames are small and latency-sensitive; do not let Nagle hold them.
        if let Err(e) = stream.set_nodelay(true) {
            debug!("backend {}: failed to set TCP_NODELAY: {e}", self.addr);
        }

        let (read_half, write_half) = stream.into_split();
        Ok((
            StreamFrameSource::new(read_half, self.layout),
            StreamFrameSink::new(write_half),
        ))
    }

    fn backend(&self) -> &str {
        &self.addr
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
