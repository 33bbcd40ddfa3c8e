//! Module `acceptor`
//!
//! rustls-backed [`TlsContextFactory`] producing `tokio_rustls::TlsAcceptor`s
//! from PEM certificate, key and optional client CA files.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use log::info;
use rustls::RootCertStore;
use rustls::ServerConfig;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use tokio_rustls::TlsAcceptor;

use super::TlsContextFactory;
use crate::error::TlsError;

pub struct RustlsContextFactory {
    server_only: Arc<ServerConfig>,
    mutual: Option<Arc<ServerConfig>>,
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
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

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}

impl RustlsContextFactory {
    /// Loads the server identity and, when given, the CA used to verify
    /// client certificates.
    pub fn from_pem_files(
        cert_path: &Path,
        key_path: &Path,
        client_ca_path: Option<&Path>,
    ) -> Result<Self, TlsError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let certs = load_certs(cert_path)?;
        let key = load_key(key_path)?;

        let server_only = ServerConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(certs.clone(), key.clone_key())?;

        let mutual = match client_ca_path {
            Some(ca_path) => Some(Arc::new(Self::mutual_config(
                provider, ca_path, certs, key,
            )?)),
            None => None,
        };

        info!("Loaded TLS identity from {}", cert_path.display());
        Ok(Self {
            server_only: Arc::new(server_only),
            mutual,
        })
    }

    fn mutual_config(
        provider: Arc<CryptoProvider>,
        ca_path: &Path,
        certs: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> Result<ServerConfig, TlsError> {
        let mut roots = RootCertStore::empty();
        for ca in load_certs(ca_path)? {
            roots.add(ca)?;
        }
        let verifier =
            WebPkiClientVerifier::builder_with_provider(Arc::new(roots), Arc::clone(&provider))
                .build()
                .map_err(|e| TlsError::ClientVerifier(e.to_string()))?;

        Ok(ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_client_cert_verifier(verifier)
            .with_single_cert(certs, key)?)
    }
}

impl TlsContextFactory for RustlsContextFactory {
    type Handler = TlsAcceptor;

    fn build_handler(&self, require_client_auth: bool) -> Result<TlsAcceptor, TlsError> {
        let config = if require_client_auth {
            self.mutual.as_ref().ok_or(TlsError::MissingClientCa)?
        } else {
            &self.server_only
        };
        Ok(TlsAcceptor::from(Arc::clone(config)))
    }
}
