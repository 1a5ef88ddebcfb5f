//! TLS termination for the browser-facing listener.
//!
//! When a certificate chain and private key are configured the listener
//! serves `https://` and `wss://`; the relay logic is unchanged.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use thiserror::Error;
use tokio_rustls::TlsAcceptor;

use crate::domain::TlsFiles;

/// Errors while loading TLS material.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no certificates found in {}", .0.display())]
    NoCertificates(PathBuf),

    #[error("no private key found in {}", .0.display())]
    NoPrivateKey(PathBuf),

    #[error("invalid TLS configuration: {0}")]
    Config(#[from] rustls::Error),
}

/// Builds a TLS acceptor from the configured PEM files.
///
/// # Errors
///
/// Returns [`TlsError`] if either file cannot be read or parsed, or if the key
/// does not match the certificate.
pub fn load_acceptor(files: &TlsFiles) -> Result<TlsAcceptor, TlsError> {
    let certs = load_certificates(&files.cert_path)?;
    let key = load_private_key(&files.key_path)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn pem_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_missing_certificate_file() {
        // Arrange
        let files = TlsFiles {
            cert_path: PathBuf::from("/nonexistent/relay-cert.pem"),
            key_path: PathBuf::from("/nonexistent/relay-key.pem"),
        };

        // Act
        let result = load_acceptor(&files);

        // Assert
        match result {
            Err(TlsError::Read { path, .. }) => assert_eq!(path, files.cert_path),
            Err(e) => panic!("expected a read error, got {e}"),
            Ok(_) => panic!("expected a read error"),
        }
    }

    #[test]
    fn test_file_without_certificates() {
        let cert = pem_file("not a certificate\n");
        let key = pem_file("");
        let files = TlsFiles {
            cert_path: cert.path().to_path_buf(),
            key_path: key.path().to_path_buf(),
        };

        let result = load_acceptor(&files);

        assert!(matches!(result, Err(TlsError::NoCertificates(_))));
    }

    #[test]
    fn test_file_without_private_key() {
        let key = pem_file("-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n");
        let result = load_private_key(key.path());
        assert!(matches!(result, Err(TlsError::NoPrivateKey(_))));
    }

    #[test]
    fn test_error_message_names_the_file() {
        let err = TlsError::NoPrivateKey(PathBuf::from("/etc/relay/key.pem"));
        assert_eq!(err.to_string(), "no private key found in /etc/relay/key.pem");
    }
}
