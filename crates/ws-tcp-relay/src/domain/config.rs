//! Relay configuration types.
//!
//! [`RelayConfig`] is the single source of truth for all runtime settings.
//! It is assembled in `main.rs` from CLI arguments, an optional TOML file, and
//! the defaults below, then wrapped in an `Arc` and shared by every session.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use relay_core::FrameLayout;

/// Backend address used when none is given.
pub const DEFAULT_BACKEND_ADDR: &str = "127.0.0.1:7788";

/// Port the relay listens on when none is given.
pub const DEFAULT_LISTEN_PORT: u16 = 8080;

/// Path on which WebSocket upgrades are accepted.
pub const DEFAULT_WS_PATH: &str = "/ws";

/// Bound on dialing the backend.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(2);

/// Checks that `path` can serve as the WebSocket route.
///
/// It must be absolute, must not collide with the console at `/`, and must not
/// contain the router's `:` and `*` capture markers.
pub fn check_ws_path(path: &str) -> Result<(), String> {
    if !path.starts_with('/') {
        return Err(format!("WebSocket path must start with '/': '{path}'"));
    }
    if path == "/" {
        return Err("WebSocket path cannot be '/', which serves the test console".to_string());
    }
    if path.contains([':', '*']) {
        return Err(format!("WebSocket path cannot contain ':' or '*': '{path}'"));
    }
    Ok(())
}

/// How frames are tagged when sent to the browser.
///
/// This only affects the WebSocket opcode; the bytes carried are identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageMode {
    /// Binary WebSocket messages (opcode 0x2).
    #[default]
    Binary,
    /// Text WebSocket messages (opcode 0x1).  Frame bytes are sent as-is,
    /// even when they are not valid UTF-8.
    Text,
}

impl MessageMode {
    /// Maps the `--binary` flag onto a mode.
    pub fn from_binary_flag(binary: bool) -> Self {
        if binary {
            Self::Binary
        } else {
            Self::Text
        }
    }
}

impl fmt::Display for MessageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary => f.write_str("binary"),
            Self::Text => f.write_str("text"),
        }
    }
}

/// Certificate chain and private key for serving the listener over TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    /// PEM file holding the certificate chain.
    pub cert_path: PathBuf,
    /// PEM file holding the private key.
    pub key_path: PathBuf,
}

/// All runtime configuration for the relay.
///
/// # Example
///
/// ```rust
/// use ws_tcp_relay::domain::RelayConfig;
///
/// let cfg = RelayConfig::default();
/// assert_eq!(cfg.listen_addr.port(), 8080);
/// assert_eq!(cfg.backend_addr, "127.0.0.1:7788");
/// ```
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// The address and port the HTTP/WebSocket listener binds to.
    pub listen_addr: SocketAddr,

    /// The backend TCP address every session dials (`host:port`).
    ///
    /// Kept as a string so host names are resolved at dial time.
    pub backend_addr: String,

    /// Request path that is upgraded to a WebSocket.
    pub ws_path: String,

    /// Opcode used for messages sent to the browser.
    pub message_mode: MessageMode,

    /// Framing used on the backend byte stream.
    pub frame_layout: FrameLayout,

    /// Bound on opening the backend connection.
    pub dial_timeout: Duration,

    /// Deadline for reading one frame.  `None` waits forever.
    pub idle_timeout: Option<Duration>,

    /// Maximum concurrent sessions.  `None` admits every connection.
    pub max_sessions: Option<usize>,

    /// Serve over TLS when set.
    pub tls: Option<TlsFiles>,
}

impl Default for RelayConfig {
    /// | Field          | Default              |
    /// |----------------|----------------------|
    /// | listen_addr    | `0.0.0.0:8080`       |
    /// | backend_addr   | `127.0.0.1:7788`     |
    /// | ws_path        | `/ws`                |
    /// | message_mode   | binary               |
    /// | frame_layout   | 4-byte header, 64 KiB|
    /// | dial_timeout   | 2 seconds            |
    /// | idle_timeout   | none                 |
    /// | max_sessions   | unbounded            |
    /// | tls            | none                 |
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_LISTEN_PORT)),
            backend_addr: DEFAULT_BACKEND_ADDR.to_string(),
            ws_path: DEFAULT_WS_PATH.to_string(),
            message_mode: MessageMode::default(),
            frame_layout: FrameLayout::default(),
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            idle_timeout: None,
            max_sessions: None,
            tls: None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_listen_port_is_8080() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.listen_addr.port(), 8080);
        assert!(cfg.listen_addr.ip().is_unspecified());
    }

    #[test]
    fn test_default_backend_is_local_7788() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.backend_addr, "127.0.0.1:7788");
    }

    #[test]
    fn test_default_mode_is_binary() {
        assert_eq!(RelayConfig::default().message_mode, MessageMode::Binary);
    }

    #[test]
    fn test_default_dial_timeout_is_2s() {
        assert_eq!(RelayConfig::default().dial_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_default_hardening_knobs_are_off() {
        // The baseline relay has no read deadline and no admission limit.
        let cfg = RelayConfig::default();
        assert!(cfg.idle_timeout.is_none());
        assert!(cfg.max_sessions.is_none());
        assert!(cfg.tls.is_none());
    }

    #[test]
    fn test_message_mode_from_binary_flag() {
        assert_eq!(MessageMode::from_binary_flag(true), MessageMode::Binary);
        assert_eq!(MessageMode::from_binary_flag(false), MessageMode::Text);
    }

    #[test]
    fn test_ws_path_rules() {
        assert!(check_ws_path(DEFAULT_WS_PATH).is_ok());
        assert!(check_ws_path("/relay/v1").is_ok());
        assert!(check_ws_path("ws").is_err());
        assert!(check_ws_path("/").is_err());
        assert!(check_ws_path("/ws/:id").is_err());
        assert!(check_ws_path("/*rest").is_err());
    }

    #[test]
    fn test_message_mode_display() {
        assert_eq!(MessageMode::Binary.to_string(), "binary");
        assert_eq!(MessageMode::Text.to_string(), "text");
    }
}
