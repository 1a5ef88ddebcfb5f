//! ws-tcp-relay entry point.
//!
//! This binary accepts WebSocket connections from web browsers and relays each
//! one to its own TCP connection on a backend that speaks length-prefixed
//! frames.  Frames carried by WebSocket messages are forwarded whole, and
//! each backend frame is delivered as exactly one WebSocket message.
//!
//! # Usage
//!
//! ```text
//! ws-tcp-relay [OPTIONS] [BACKEND]
//!
//! Options:
//!   -c, --connect <ADDR>        Backend address [default: 127.0.0.1:7788]
//!   -p, --port <PORT>           Listen port [default: 8080]
//!       --bind <IP>             Listen address [default: 0.0.0.0]
//!       --tlscert <FILE>        PEM certificate chain (TLS needs --tlskey too)
//!       --tlskey <FILE>         PEM private key
//!   -b, --binary[=<BOOL>]       Binary (true) or text (false) messages [default: true]
//!       --ws-path <PATH>        WebSocket path [default: /ws]
//!       --header-size <N>       Frame header size in bytes [default: 4]
//!       --max-frame-size <N>    Largest accepted frame [default: 65536]
//!       --dial-timeout-ms <MS>  Backend connect timeout [default: 2000]
//!       --idle-timeout <SECS>   Per-frame read deadline, 0 disables [default: 0]
//!       --max-sessions <N>      Concurrent session limit [default: unlimited]
//!       --log-dir <DIR>         Also log to daily files in DIR
//!       --log-name <NAME>       Log file base name [default: ws-tcp-relay]
//!       --config <FILE>         TOML config file
//! ```
//!
//! # Precedence
//!
//! A flag (or its environment variable) wins over the config file, which wins
//! over the built-in default.
//!
//! | Variable                 | Flag          |
//! |--------------------------|---------------|
//! | `WS_TCP_RELAY_BACKEND`   | `--connect`   |
//! | `WS_TCP_RELAY_PORT`      | `--port`      |
//! | `WS_TCP_RELAY_LOG_DIR`   | `--log-dir`   |
//! | `WS_TCP_RELAY_CONFIG`    | `--config`    |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{ArgAction, Parser};
use relay_core::{FrameLayout, DEFAULT_HEADER_SIZE, DEFAULT_MAX_FRAME_SIZE};
use tracing::{info, warn};

use ws_tcp_relay::domain::config::{
    DEFAULT_BACKEND_ADDR, DEFAULT_DIAL_TIMEOUT, DEFAULT_LISTEN_PORT, DEFAULT_WS_PATH,
};
use ws_tcp_relay::domain::{check_ws_path, MessageMode, RelayConfig, TlsFiles};
use ws_tcp_relay::infrastructure::{
    init_logging, load_file_config, run_server, FileConfig, LogSettings,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// WebSocket-to-TCP relay with length-prefixed framing.
///
/// Every option is optional here so that an unset flag can fall through to the
/// config file before the built-in default applies.
#[derive(Debug, Parser)]
#[command(
    name = "ws-tcp-relay",
    about = "Relays WebSocket messages to a TCP backend as length-prefixed frames",
    version
)]
struct Cli {
    /// Backend address (`host:port`).
    #[arg(short = 'c', long = "connect", value_name = "ADDR", env = "WS_TCP_RELAY_BACKEND")]
    connect: Option<String>,

    /// Backend address given positionally.
    #[arg(value_name = "BACKEND", conflicts_with = "connect")]
    backend: Option<String>,

    /// Port the HTTP/WebSocket listener binds to.
    #[arg(short, long, env = "WS_TCP_RELAY_PORT")]
    port: Option<u16>,

    /// IP address the listener binds to.
    #[arg(long, value_name = "IP")]
    bind: Option<String>,

    /// PEM certificate chain.  TLS is enabled only when `--tlskey` is set too.
    #[arg(long, value_name = "FILE")]
    tlscert: Option<PathBuf>,

    /// PEM private key.
    #[arg(long, value_name = "FILE")]
    tlskey: Option<PathBuf>,

    /// Send binary (`true`) or text (`false`) WebSocket messages.
    #[arg(
        short,
        long,
        value_name = "BOOL",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        require_equals = true
    )]
    binary: Option<bool>,

    /// Request path that is upgraded to a WebSocket.
    #[arg(long, value_name = "PATH")]
    ws_path: Option<String>,

    /// Bytes of frame header, including the 2-byte length field.
    #[arg(long, value_name = "N")]
    header_size: Option<usize>,

    /// Largest frame accepted from either side.
    #[arg(long, value_name = "N")]
    max_frame_size: Option<usize>,

    /// Backend connect timeout in milliseconds.
    #[arg(long, value_name = "MS")]
    dial_timeout_ms: Option<u64>,

    /// Seconds to wait for a frame before closing the session.  `0` disables.
    #[arg(long, value_name = "SECS")]
    idle_timeout: Option<u64>,

    /// Maximum concurrent sessions.
    #[arg(long, value_name = "N")]
    max_sessions: Option<usize>,

    /// Directory for daily log files.
    #[arg(long, value_name = "DIR", env = "WS_TCP_RELAY_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Base name of the daily log files.
    #[arg(long, value_name = "NAME")]
    log_name: Option<String>,

    /// TOML config file.
    #[arg(long, value_name = "FILE", env = "WS_TCP_RELAY_CONFIG")]
    config: Option<PathBuf>,
}

/// Everything `main` needs after flags and file have been merged.
#[derive(Debug)]
struct Settings {
    relay: RelayConfig,
    log: LogSettings,
    /// Problems worth reporting once logging is up.
    warnings: Vec<String>,
}

impl Cli {
    /// Merges the flags with `file`, falling back to the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the bind address is not an IP address, the
    /// WebSocket path does not start with `/`, or the frame layout is invalid.
    fn into_settings(self, file: FileConfig) -> anyhow::Result<Settings> {
        let mut warnings = Vec::new();

        let bind = self.bind.or(file.relay.bind);
        let ip: IpAddr = match bind {
            Some(text) => text
                .parse()
                .with_context(|| format!("invalid bind address: '{text}'"))?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        let port = self.port.or(file.relay.port).unwrap_or(DEFAULT_LISTEN_PORT);

        let backend_addr = self
            .connect
            .or(self.backend)
            .or(file.relay.backend)
            .unwrap_or_else(|| DEFAULT_BACKEND_ADDR.to_string());

        let ws_path = self
            .ws_path
            .or(file.relay.ws_path)
            .unwrap_or_else(|| DEFAULT_WS_PATH.to_string());
        check_ws_path(&ws_path).map_err(anyhow::Error::msg)?;

        let binary = self.binary.or(file.relay.binary).unwrap_or(true);

        let frame_layout = FrameLayout::new(
            self.header_size
                .or(file.framing.header_size)
                .unwrap_or(DEFAULT_HEADER_SIZE),
            self.max_frame_size
                .or(file.framing.max_frame_size)
                .unwrap_or(DEFAULT_MAX_FRAME_SIZE),
        )
        .context("invalid frame layout")?;

        let dial_timeout = self
            .dial_timeout_ms
            .or(file.limits.dial_timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DIAL_TIMEOUT);

        let idle_timeout = self
            .idle_timeout
            .or(file.limits.idle_timeout_secs)
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs);

        let max_sessions = self.max_sessions.or(file.limits.max_sessions);
        if max_sessions == Some(0) {
            bail!("--max-sessions must be at least 1");
        }

        let tls = match (self.tlscert.or(file.tls.cert), self.tlskey.or(file.tls.key)) {
            (Some(cert_path), Some(key_path)) => Some(TlsFiles {
                cert_path,
                key_path,
            }),
            (Some(_), None) => {
                warnings.push("TLS certificate given without a key; serving plaintext".to_string());
                None
            }
            (None, Some(_)) => {
                warnings.push("TLS key given without a certificate; serving plaintext".to_string());
                None
            }
            (None, None) => None,
        };

        let log = LogSettings {
            dir: self.log_dir.or(file.log.dir),
            name: self
                .log_name
                .or(file.log.name)
                .unwrap_or_else(|| LogSettings::default().name),
        };

        Ok(Settings {
            relay: RelayConfig {
                listen_addr: SocketAddr::new(ip, port),
                backend_addr,
                ws_path,
                message_mode: MessageMode::from_binary_flag(binary),
                frame_layout,
                dial_timeout,
                idle_timeout,
                max_sessions,
                tls,
            },
            log,
            warnings,
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// 1. Parse the flags and load the config file, if one is named.
/// 2. Install logging (stderr, plus daily files when a directory is set).
/// 3. Spawn a Ctrl+C handler that clears the shared `running` flag.
/// 4. Run the listener until the flag is cleared.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();

    let file = match cli.config.take() {
        Some(path) => load_file_config(&path)
            .with_context(|| format!("failed to load config file {}", path.display()))?,
        None => FileConfig::default(),
    };
    let settings = cli.into_settings(file)?;

    init_logging(&settings.log)?;
    for warning in &settings.warnings {
        warn!("{warning}");
    }

    let config = settings.relay;
    info!(
        "ws-tcp-relay starting: listen={}, backend={}",
        config.listen_addr, config.backend_addr
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    // The accept loop checks `running` every 200 ms and exits cleanly.
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, running).await?;

    info!("ws-tcp-relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
