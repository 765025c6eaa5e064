//! TLS root loading for transport connectors.
//!
//! The OS certificate store is read at most once per process; every
//! transport built afterwards reuses the cached roots.

use crate::error::ConfigError;
use rustls_pki_types::CertificateDer;
use std::sync::{Arc, OnceLock};

static NATIVE_ROOTS: OnceLock<Vec<CertificateDer<'static>>> = OnceLock::new();

#[cfg(test)]
static NATIVE_LOADS: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

fn load_native_roots() -> Vec<CertificateDer<'static>> {
    #[cfg(test)]
    NATIVE_LOADS.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

    let result = rustls_native_certs::load_native_certs();
    for err in &result.errors {
        tracing::warn!(error = %err, "error loading native root certificate");
    }

    if result.certs.is_empty() {
        tracing::warn!("no native root CA certificates found");
    } else {
        tracing::debug!(count = result.certs.len(), "loaded native root certificates");
    }
    result.certs
}

/// Cached native root certificates (possibly empty).
pub fn native_root_certs() -> &'static [CertificateDer<'static>] {
    NATIVE_ROOTS.get_or_init(load_native_roots).as_slice()
}

/// Crypto provider for transport TLS.
///
/// Prefers a process-wide default when the application installed one,
/// otherwise builds an aws-lc-rs provider without installing it globally.
pub fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

/// Build a rustls `ClientConfig` trusting the OS root store.
///
/// # Errors
/// Returns [`ConfigError::Tls`] when no usable root certificate is available,
/// so a broken trust store fails transport construction instead of every handshake.
pub fn native_roots_client_config() -> Result<rustls::ClientConfig, ConfigError> {
    let certs = native_root_certs();
    if certs.is_empty() {
        return Err(tls_error(
            "no native root CA certificates found in OS certificate store",
        ));
    }

    let mut roots = rustls::RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(certs.iter().cloned());
    if ignored > 0 {
        tracing::warn!(added, ignored, "some native root certificates could not be parsed");
    }
    if added == 0 {
        return Err(tls_error(format!(
            "none of the {} native root CA certificates could be parsed",
            certs.len()
        )));
    }

    let config = rustls::ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| ConfigError::Tls(Box::new(e)))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(config)
}

fn tls_error(msg: impl Into<String>) -> ConfigError {
    let msg: String = msg.into();
    ConfigError::Tls(msg.into())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    /// Other tests may have filled the cache already, so only "at most one
    /// additional load" is asserted.
    #[test]
    fn test_native_roots_loaded_once() {
        let before = NATIVE_LOADS.load(Ordering::SeqCst);

        let first = native_root_certs();
        let second = native_root_certs();

        let after = NATIVE_LOADS.load(Ordering::SeqCst);
        assert!(after <= before + 1);
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn test_native_roots_client_config_does_not_panic() {
        // Minimal CI containers may have no OS roots; both outcomes are valid.
        match native_roots_client_config() {
            Ok(_) => {}
            Err(e) => assert!(matches!(e, ConfigError::Tls(_))),
        }
    }
}
