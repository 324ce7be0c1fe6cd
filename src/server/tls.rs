//! TLS configuration loading.

use std::sync::Arc;

use anyhow::{bail, Context};
use rustls_pki_types::{pem::PemObject, CertificateDer, PrivateKeyDer};

use super::config::TlsSettings;

/// Build a rustls server config from PEM-encoded certificate and key files.
///
/// The certificate file may contain a chain; the key file must hold exactly
/// one private key. Called during listener setup so a bad deployment fails
/// before the first connection is accepted.
pub(crate) fn build_tls_config(settings: &TlsSettings) -> anyhow::Result<Arc<rustls::ServerConfig>> {
    if !settings.cert_path.exists() {
        bail!("certificate file not found: {}", settings.cert_path.display());
    }
    if !settings.key_path.exists() {
        bail!("private key file not found: {}", settings.key_path.display());
    }

    let certs: Vec<CertificateDer<'static>> = CertificateDer::pem_file_iter(&settings.cert_path)
        .with_context(|| format!("open certificate {}", settings.cert_path.display()))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("parse certificate {}", settings.cert_path.display()))?;

    let key = PrivateKeyDer::from_pem_file(&settings.key_path)
        .with_context(|| format!("load private key {}", settings.key_path.display()))?;

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("assemble TLS configuration")?;

    Ok(Arc::new(config))
}
