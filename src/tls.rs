//! Client TLS material loaded from PEM files on disk.
//!
//! [`TlsMaterial::load`] reads a certificate, its private key and a CA
//! bundle and turns them into a [`rustls::ClientConfig`] presenting that
//! certificate and trusting that CA. Nothing is cached: every call goes
//! back to the files.

use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, RootCertStore};
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;

use crate::crypto_provider::crypto_provider;

/// Reasons a certificate and private key could not be loaded as a pair.
#[derive(Debug, Error)]
pub enum KeyPairError {
    /// Wrapper for std::io::Error
    #[error("{0}")]
    IOError(#[from] std::io::Error),
    /// The certificate file held no PEM certificate.
    #[error("no certificate found in {}", .0.display())]
    NoCertificate(PathBuf),
    /// The key file held no PEM private key.
    #[error("no private key found in {}", .0.display())]
    NoPrivateKey(PathBuf),
    /// The leaf certificate is not valid DER X.509.
    #[error("cannot parse certificate: {0}")]
    BadCertificate(String),
    /// The private key does not belong to the leaf certificate.
    #[error("private key does not match certificate public key")]
    KeyMismatch,
    /// Wrapper for rustls::Error
    #[error("{0}")]
    TLSError(#[from] rustls::Error),
}

/// Error type returned by [`TlsMaterial::load`].
#[derive(Debug, Error)]
pub enum TlsConfigError {
    /// The certificate/key pair could not be loaded.
    #[error("loading key pair from {} and {}: {source}", cert_path.display(), key_path.display())]
    KeyPair {
        /// Certificate file.
        cert_path: PathBuf,
        /// Private key file.
        key_path: PathBuf,
        /// Underlying failure.
        source: KeyPairError,
    },
    /// The CA certificate file could not be read.
    #[error("reading CA certificate {}: {source}", path.display())]
    CaRead {
        /// CA certificate file.
        path: PathBuf,
        /// Underlying failure.
        source: std::io::Error,
    },
    /// The CA certificate file held no usable PEM certificate.
    #[error("failed to parse CA certificate {} as PEM encoded content", path.display())]
    CaPem {
        /// CA certificate file.
        path: PathBuf,
    },
}

/// A client identity and trust bundle, and the [`ClientConfig`] built from
/// them.
///
/// The PEM text of every input is retained as well because tonic-based
/// clients (such as `etcd-client`) want PEM rather than rustls types.
#[derive(Clone)]
pub struct TlsMaterial {
    cert_chain: Vec<CertificateDer<'static>>,
    roots: Arc<RootCertStore>,
    client_config: Arc<ClientConfig>,
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
    ca_pem: Vec<u8>,
    valid_until: Option<OffsetDateTime>,
}

impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("cert_chain_len", &self.cert_chain.len())
            .field("roots", &self.roots.len())
            .field("valid_until", &self.valid_until)
            .finish_non_exhaustive()
    }
}

struct KeyPair {
    cert_chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
    valid_until: Option<OffsetDateTime>,
}

fn load_key_pair(
    provider: &CryptoProvider,
    cert_path: &Path,
    key_path: &Path,
) -> Result<KeyPair, KeyPairError> {
    let cert_pem = std::fs::read(cert_path)?;
    let cert_chain =
        rustls_pemfile::certs(&mut Cursor::new(&cert_pem)).collect::<Result<Vec<_>, _>>()?;
    let Some(leaf) = cert_chain.first() else {
        return Err(KeyPairError::NoCertificate(cert_path.to_path_buf()));
    };

    let key_pem = std::fs::read(key_path)?;
    let key = rustls_pemfile::private_key(&mut Cursor::new(&key_pem))?
        .ok_or_else(|| KeyPairError::NoPrivateKey(key_path.to_path_buf()))?;

    let (_, cert) = x509_parser::parse_x509_certificate(leaf.as_ref())
        .map_err(|e| KeyPairError::BadCertificate(e.to_string()))?;
    let signing_key = provider.key_provider.load_private_key(key.clone_key())?;
    if let Some(spki) = signing_key.public_key() {
        if cert.public_key().raw != &*spki {
            return Err(KeyPairError::KeyMismatch);
        }
    }

    let valid_until = Some(cert.validity().not_after.to_datetime());

    Ok(KeyPair {
        cert_chain,
        key,
        cert_pem,
        key_pem,
        valid_until,
    })
}

fn load_roots(ca_path: &Path) -> Result<(RootCertStore, Vec<u8>), TlsConfigError> {
    let ca_pem = std::fs::read(ca_path).map_err(|source| TlsConfigError::CaRead {
        path: ca_path.to_path_buf(),
        source,
    })?;
    let pem_error = || TlsConfigError::CaPem {
        path: ca_path.to_path_buf(),
    };
    // Malformed blocks are skipped as long as one certificate survives.
    let mut cursor = Cursor::new(&ca_pem);
    let certs = rustls_pemfile::certs(&mut cursor).filter_map(Result::ok);
    let mut roots = RootCertStore::empty();
    let (added, _) = roots.add_parsable_certificates(certs);
    if added == 0 {
        return Err(pem_error());
    }
    Ok((roots, ca_pem))
}

impl TlsMaterial {
    /// Load a certificate, its private key and a CA bundle and build a
    /// client configuration from them.
    ///
    /// The certificate file may hold a chain; the first certificate is the
    /// leaf and must match the private key. The CA file must contain at
    /// least one parseable PEM certificate.
    pub fn load(
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
        ca_path: impl AsRef<Path>,
    ) -> Result<Self, TlsConfigError> {
        let (cert_path, key_path) = (cert_path.as_ref(), key_path.as_ref());
        let key_pair_error = |source| TlsConfigError::KeyPair {
            cert_path: cert_path.to_path_buf(),
            key_path: key_path.to_path_buf(),
            source,
        };
        let provider = crypto_provider();
        let pair = load_key_pair(&provider, cert_path, key_path).map_err(key_pair_error)?;
        let (roots, ca_pem) = load_roots(ca_path.as_ref())?;
        let roots = Arc::new(roots);

        let client_config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .and_then(|b| {
                b.with_root_certificates(Arc::clone(&roots))
                    .with_client_auth_cert(pair.cert_chain.clone(), pair.key)
            })
            .map_err(|e| key_pair_error(e.into()))?;

        Ok(Self {
            cert_chain: pair.cert_chain,
            roots,
            client_config: Arc::new(client_config),
            cert_pem: pair.cert_pem,
            key_pem: pair.key_pem,
            ca_pem,
            valid_until: pair.valid_until,
        })
    }

    /// The client certificate followed by any intermediates from the
    /// certificate file.
    pub fn cert_chain(&self) -> &[CertificateDer<'static>] {
        &self.cert_chain
    }

    /// Trust anchors parsed from the CA file. Never empty.
    pub fn roots(&self) -> &Arc<RootCertStore> {
        &self.roots
    }

    /// rustls client configuration presenting the loaded identity and
    /// trusting the loaded roots.
    pub fn client_config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.client_config)
    }

    /// PEM text of the certificate and private key files, in that order.
    pub fn identity_pem(&self) -> (&[u8], &[u8]) {
        (&self.cert_pem, &self.key_pem)
    }

    /// PEM text of the CA file.
    pub fn ca_pem(&self) -> &[u8] {
        &self.ca_pem
    }

    /// Expiry time of the client certificate.
    pub fn identity_valid_until(&self) -> Option<OffsetDateTime> {
        self.valid_until
    }
}
