//! Provide access to the process-global default [`CryptoProvider`] if there
//! is one, otherwise aws-lc-rs.

use rustls::crypto::CryptoProvider;
use std::sync::Arc;

/// The [`CryptoProvider`] used for loading private keys and building
/// client TLS configurations.
pub fn crypto_provider() -> Arc<CryptoProvider> {
    CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}
