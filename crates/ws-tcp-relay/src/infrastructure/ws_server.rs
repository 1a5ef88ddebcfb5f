//! Listener: accept loop, HTTP routing, and per-session task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address (optionally with TLS).
//! 2. Accepting incoming connections and admitting them against the session
//!    limit.
//! 3. Serving HTTP/1 on each connection through the [`http::router`]: the
//!    WebSocket path is upgraded, `/` serves the test console, anything else
//!    is a 404.
//! 4. Running a [`RelaySession`] for every upgraded WebSocket.
//! 5. Stopping the accept loop when the `running` flag is cleared.
//!
//! # Scalability
//!
//! Each connection runs in its own Tokio task, and each session runs its two
//! pumps in two more.  The accept loop never blocks on a client: it accepts a
//! connection and immediately spawns a task for it before accepting the next
//! one.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use axum::extract::ConnectInfo;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use relay_core::FrameLayout;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::WebSocketStream;
use tower::ServiceExt;
use tracing::{debug, error, info, warn};

use crate::application::{FrameSink, RelaySession, SessionOutcome};
use crate::domain::{RelayConfig, SessionId};
use crate::infrastructure::backend_conn::TcpDialer;
use crate::infrastructure::http::{self, SessionSlot};
use crate::infrastructure::tls;
use crate::infrastructure::ws_conn::split_websocket;

/// How long the accept loop waits before re-checking the `running` flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// Bound on the TLS handshake and on receiving a request head.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest request head accepted before the connection is dropped.
const MAX_REQUEST_HEAD: usize = 8 * 1024;

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.listen_addr` and serves until `running` is set to `false`.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound (e.g., the port is
/// already in use) or the TLS material cannot be loaded.
pub async fn run_server(config: RelayConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", config.listen_addr))?;
    serve(listener, config, running).await
}

/// Runs the accept loop on an already-bound listener.
///
/// Tests bind port 0 and pass the listener in so they can learn the port.
///
/// # Errors
///
/// Returns an error if the TLS material cannot be loaded, the WebSocket path
/// cannot be routed, or the listener has no local address.
pub async fn serve(
    listener: TcpListener,
    config: RelayConfig,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let tls = match &config.tls {
        Some(files) => Some(tls::load_acceptor(files).context("failed to load TLS certificate and key")?),
        None => None,
    };
    let local_addr = listener
        .local_addr()
        .context("listener has no local address")?;

    info!(
        "relay listening on {local_addr} ({}), path {}, backend {}, {} messages, {}-byte headers",
        if tls.is_some() { "wss" } else { "ws" },
        config.ws_path,
        config.backend_addr,
        config.message_mode,
        config.frame_layout.header_size(),
    );

    let admission = config.max_sessions.map(|n| Arc::new(Semaphore::new(n)));
    let secure = tls.is_some();
    let router = http::router(Arc::new(config), secure)?;

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // A short timeout lets the loop notice the shutdown flag even when no
        // one is connecting.
        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                let permit = match &admission {
                    Some(slots) => match Arc::clone(slots).try_acquire_owned() {
                        Ok(permit) => Some(permit),
                        Err(_) => {
                            warn!("rejecting connection from {peer}: session limit reached");
                            continue;
                        }
                    },
                    None => None,
                };

                debug!("new connection from {peer}");
                let router = router.clone();
                let tls = tls.clone();
                tokio::spawn(handle_connection(
                    stream,
                    peer,
                    router,
                    tls,
                    SessionSlot::new(permit),
                ));
            }
            Ok(Err(e)) => {
                // Transient (e.g., too many open file descriptors); keep serving.
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }

    Ok(())
}

// ── Per-connection handling ───────────────────────────────────────────────────

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Router,
    tls: Option<TlsAcceptor>,
    slot: SessionSlot,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("{peer}: failed to set TCP_NODELAY: {e}");
    }

    match tls {
        Some(acceptor) => match timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
            Ok(Ok(stream)) => serve_http(stream, peer, router, slot).await,
            Ok(Err(e)) => debug!("{peer}: TLS handshake failed: {e}"),
            Err(_) => debug!("{peer}: TLS handshake timed out"),
        },
        None => serve_http(stream, peer, router, slot).await,
    }
}

/// Serves HTTP/1 requests on one connection until it closes or is upgraded.
async fn serve_http<S>(stream: S, peer: SocketAddr, router: Router, slot: SessionSlot)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = service_fn(move |mut req: hyper::Request<Incoming>| {
        req.extensions_mut().insert(ConnectInfo(peer));
        req.extensions_mut().insert(slot.clone());
        router.clone().oneshot(req)
    });

    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(HANDSHAKE_TIMEOUT)
        .max_buf_size(MAX_REQUEST_HEAD);

    if let Err(e) = builder
        .serve_connection(TokioIo::new(stream), service)
        .with_upgrades()
        .await
    {
        debug!("{peer}: HTTP connection failed: {e}");
    }
}

/// Runs a relay session on an upgraded WebSocket.
pub(crate) async fn relay<S>(ws: WebSocketStream<S>, peer: SocketAddr, config: Arc<RelayConfig>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    info!("session {peer}: WebSocket established");

    let (client_source, client_sink) =
        split_websocket(ws, config.frame_layout, config.message_mode);
    let dialer = TcpDialer::new(
        config.backend_addr.clone(),
        config.dial_timeout,
        config.frame_layout,
    );
    let session =
        RelaySession::new(SessionId::from(peer), dialer).with_idle_timeout(config.idle_timeout);

    if let SessionOutcome::DialFailed {
        mut client_sink, ..
    } = session.run(client_source, client_sink).await
    {
        if let Err(e) = client_sink.close().await {
            debug!("session {peer}: closing WebSocket after dial failure: {e}");
        }
    }
}

/// Caps incoming WebSocket messages at one maximum-size frame.
pub(crate) fn websocket_config(layout: &FrameLayout) -> WebSocketConfig {
    let limit = layout.effective_max_frame_size();
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(limit);
    config.max_frame_size = Some(limit);
    config
}

// ── Tests ─────────────────────────────────────────────────────────────────────
