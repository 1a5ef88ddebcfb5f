//! Optional TOML configuration file.
//!
//! Every setting is optional; command-line flags override anything set here,
//! and anything set in neither place falls back to the built-in default.
//!
//! ```toml
//! [relay]
//! backend = "10.0.0.5:7788"
//! bind = "0.0.0.0"
//! port = 8443
//! ws_path = "/ws"
//! binary = true
//!
//! [framing]
//! header_size = 4
//! max_frame_size = 65536
//!
//! [limits]
//! dial_timeout_ms = 2000
//! idle_timeout_secs = 300
//! max_sessions = 512
//!
//! [tls]
//! cert = "/etc/ws-tcp-relay/cert.pem"
//! key = "/etc/ws-tcp-relay/key.pem"
//!
//! [log]
//! dir = "/var/log/ws-tcp-relay"
//! name = "ws-tcp-relay"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error reading config at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or has unknown keys.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// The whole file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub relay: RelaySection,
    pub framing: FramingSection,
    pub limits: LimitsSection,
    pub tls: TlsSection,
    pub log: LogSection,
}

/// `[relay]`: where to listen and where to relay to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelaySection {
    pub backend: Option<String>,
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub ws_path: Option<String>,
    pub binary: Option<bool>,
}

/// `[framing]`: the backend frame layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FramingSection {
    pub header_size: Option<usize>,
    pub max_frame_size: Option<usize>,
}

/// `[limits]`: timeouts and admission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsSection {
    pub dial_timeout_ms: Option<u64>,
    /// `0` disables the idle timeout.
    pub idle_timeout_secs: Option<u64>,
    pub max_sessions: Option<usize>,
}

/// `[tls]`: both paths are needed to serve TLS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TlsSection {
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
}

/// `[log]`: the daily log file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSection {
    pub dir: Option<PathBuf>,
    pub name: Option<String>,
}

/// Reads and parses the file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if it is not a valid configuration.
pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_file_config(&text)
}

/// Parses configuration from TOML text.
pub fn parse_file_config(text: &str) -> Result<FileConfig, ConfigError> {
    Ok(toml::from_str(text)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_sets_nothing() {
        assert_eq!(parse_file_config("").unwrap(), FileConfig::default());
    }

    #[test]
    fn test_sections_are_parsed() {
        // Arrange
        let text = r#"
            [relay]
            backend = "10.0.0.5:7788"
            port = 9000
            binary = false

            [framing]
            header_size = 2

            [limits]
            idle_timeout_secs = 0
            max_sessions = 8

            [tls]
            cert = "/tmp/cert.pem"
            key = "/tmp/key.pem"
        "#;

        // Act
        let cfg = parse_file_config(text).unwrap();

        // Assert
        assert_eq!(cfg.relay.backend.as_deref(), Some("10.0.0.5:7788"));
        assert_eq!(cfg.relay.port, Some(9000));
        assert_eq!(cfg.relay.binary, Some(false));
        assert_eq!(cfg.relay.bind, None);
        assert_eq!(cfg.framing.header_size, Some(2));
        assert_eq!(cfg.framing.max_frame_size, None);
        assert_eq!(cfg.limits.idle_timeout_secs, Some(0));
        assert_eq!(cfg.limits.max_sessions, Some(8));
        assert_eq!(cfg.tls.cert, Some(PathBuf::from("/tmp/cert.pem")));
        assert_eq!(cfg.log, LogSection::default());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result = parse_file_config("[relay]\nbackend_addr = \"x\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let result = parse_file_config("[relay]\nport = \"eighty\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_disk() {
        // Arrange
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[log]\ndir = \"logs\"").unwrap();

        // Act
        let cfg = load_file_config(file.path()).unwrap();

        // Assert
        assert_eq!(cfg.log.dir, Some(PathBuf::from("logs")));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_file_config(Path::new("/nonexistent/ws-tcp-relay.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
