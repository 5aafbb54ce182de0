//! Assembly of etcd client connection parameters.
//!
//! An [`EtcdClientConfig`] is produced once by an
//! [`EtcdClientConfigBuilder`] and is immutable afterwards. TLS and
//! credentials are the two settings with any logic behind them:
//!
//! ```no_run
//! use comprehensive_etcd::{EtcdClientConfig, TlsOutcome};
//!
//! let mut builder = EtcdClientConfig::builder(["10.0.0.1:2379", "10.0.0.2:2379"]);
//! match builder.apply_tls("client.pem", "client-key.pem", "ca.pem") {
//!     Ok(TlsOutcome::Enabled) => (),
//!     Ok(TlsOutcome::Disabled(reason)) => eprintln!("running without TLS: {}", reason),
//!     Err(e) => panic!("{}", e),
//! }
//! builder.apply_credentials("root", "hunter2");
//! let config = builder.build();
//! ```
//!
//! # Command line flags
//!
//! | Flag                     | Default          | Meaning                 |
//! |--------------------------|------------------|-------------------------|
//! | `--etcd-endpoints`       | `127.0.0.1:2379` | Comma separated list of etcd endpoints |
//! | `--etcd-cert-path`       | None             | Name of file containing PEM-format X.509 client certificate(s) |
//! | `--etcd-key-path`        | None             | Name of file containing PEM-format private key |
//! | `--etcd-cacert`          | None             | Name of file containing PEM-format CA certificate(s) |
//! | `--etcd-username`        | None             | Username for etcd authentication |
//! | `--etcd-password`        | Empty            | Password for etcd authentication; requires `--etcd-username` |
//! | `--etcd-connect-timeout` | None             | Timeout for establishing connections |
//! | `--etcd-timeout`         | None             | Timeout for each request |
//! | `--etcd-require-tls`     | false            | Fail instead of continuing without TLS |

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::tls::{TlsConfigError, TlsMaterial};

/// Endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:2379";

/// What to do when TLS material cannot be loaded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TlsFailurePolicy {
    /// Log the failure and continue with TLS disabled.
    #[default]
    Disable,
    /// Return the failure to the caller.
    Require,
}

/// Result of [`EtcdClientConfigBuilder::apply_tls`] when it did not fail.
#[derive(Debug)]
pub enum TlsOutcome {
    /// TLS material was loaded and installed.
    Enabled,
    /// TLS material could not be loaded so TLS is now disabled. Only
    /// returned under [`TlsFailurePolicy::Disable`].
    Disabled(TlsConfigError),
}

impl TlsOutcome {
    /// Whether TLS ended up installed.
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }
}

/// Username and password for etcd authentication.
///
/// An empty username means no authentication.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Construct from a username and password. Neither is validated.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// True if no username is set.
    pub fn is_empty(&self) -> bool {
        self.username.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connection parameters for an etcd client.
#[derive(Clone, Debug)]
pub struct EtcdClientConfig {
    endpoints: Vec<String>,
    connect_timeout: Option<Duration>,
    timeout: Option<Duration>,
    keep_alive: Option<(Duration, Duration)>,
    tls: Option<Arc<TlsMaterial>>,
    credentials: Credentials,
}

impl EtcdClientConfig {
    /// Start building a configuration for the given endpoints. If
    /// `endpoints` is empty, [`DEFAULT_ENDPOINT`] is used.
    pub fn builder<I, S>(endpoints: I) -> EtcdClientConfigBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut endpoints = endpoints.into_iter().map(Into::into).collect::<Vec<_>>();
        if endpoints.is_empty() {
            endpoints.push(String::from(DEFAULT_ENDPOINT));
        }
        EtcdClientConfigBuilder {
            config: Self {
                endpoints,
                connect_timeout: None,
                timeout: None,
                keep_alive: None,
                tls: None,
                credentials: Credentials::default(),
            },
            tls_failure_policy: TlsFailurePolicy::default(),
        }
    }

    /// Build a configuration from command line flags.
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let policy = if args.require_tls {
            TlsFailurePolicy::Require
        } else {
            TlsFailurePolicy::Disable
        };
        if args.username.is_none() && args.password.is_some() {
            return Err(ConfigError::PasswordWithoutUsername);
        }
        let mut builder = Self::builder(args.endpoints).tls_failure_policy(policy);
        if let Some(d) = args.connect_timeout {
            builder = builder.connect_timeout(d);
        }
        if let Some(d) = args.timeout {
            builder = builder.timeout(d);
        }
        match (args.cert_path, args.key_path, args.cacert) {
            (Some(cert), Some(key), Some(ca)) => {
                builder.apply_tls(cert, key, ca)?;
            }
            (None, None, None) => {
                if args.require_tls {
                    return Err(ConfigError::NoTlsFlags);
                }
            }
            _ => return Err(ConfigError::IncompleteTlsFlags),
        }
        if let Some(username) = args.username {
            builder.apply_credentials(username, args.password.unwrap_or_default());
        }
        Ok(builder.build())
    }

    /// Endpoints to connect to. Never empty.
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Timeout for establishing a connection.
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    /// Timeout for each request.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// HTTP/2 keep-alive interval and timeout.
    pub fn keep_alive(&self) -> Option<(Duration, Duration)> {
        self.keep_alive
    }

    /// TLS material, or [`None`] for plaintext connections.
    pub fn tls(&self) -> Option<&TlsMaterial> {
        self.tls.as_deref()
    }

    /// Credentials. Empty unless credentials were applied.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

/// Builder for [`EtcdClientConfig`]. See the [module documentation](self).
#[derive(Clone, Debug)]
pub struct EtcdClientConfigBuilder {
    config: EtcdClientConfig,
    tls_failure_policy: TlsFailurePolicy,
}

impl EtcdClientConfigBuilder {
    /// Select how [`Self::apply_tls`] treats failures.
    pub fn tls_failure_policy(mut self, policy: TlsFailurePolicy) -> Self {
        self.tls_failure_policy = policy;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Set the HTTP/2 keep-alive interval and timeout.
    pub fn keep_alive(mut self, interval: Duration, timeout: Duration) -> Self {
        self.config.keep_alive = Some((interval, timeout));
        self
    }

    /// Load TLS material from a certificate, its private key and a CA
    /// certificate file, all PEM, and install it.
    ///
    /// Any previously installed TLS material is discarded first, so on
    /// failure TLS is left disabled. Under [`TlsFailurePolicy::Disable`]
    /// the failure is logged and returned as [`TlsOutcome::Disabled`];
    /// under [`TlsFailurePolicy::Require`] it is returned as an error.
    pub fn apply_tls(
        &mut self,
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
        ca_path: impl AsRef<Path>,
    ) -> Result<TlsOutcome, TlsConfigError> {
        self.config.tls = None;
        match TlsMaterial::load(cert_path, key_path, ca_path) {
            Ok(material) => {
                self.config.tls = Some(Arc::new(material));
                Ok(TlsOutcome::Enabled)
            }
            Err(e) => match self.tls_failure_policy {
                TlsFailurePolicy::Require => Err(e),
                TlsFailurePolicy::Disable => {
                    log::error!("TLS setup failed, continuing without TLS: {}", e);
                    Ok(TlsOutcome::Disabled(e))
                }
            },
        }
    }

    /// Chaining form of [`Self::apply_tls`].
    pub fn with_tls(
        mut self,
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
        ca_path: impl AsRef<Path>,
    ) -> Result<Self, TlsConfigError> {
        self.apply_tls(cert_path, key_path, ca_path)?;
        Ok(self)
    }

    /// Replace the username and password. Never fails; empty strings are
    /// stored as given.
    pub fn apply_credentials(&mut self, username: impl Into<String>, password: impl Into<String>) {
        self.config.credentials = Credentials::new(username, password);
    }

    /// Chaining form of [`Self::apply_credentials`].
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.apply_credentials(username, password);
        self
    }

    /// Finish building.
    pub fn build(self) -> EtcdClientConfig {
        self.config
    }
}

/// Error type returned by [`EtcdClientConfig::from_args`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// TLS material could not be loaded and `--etcd-require-tls` was given.
    #[error("{0}")]
    TlsError(#[from] TlsConfigError),
    /// Only some of the TLS flags were given.
    #[error("--etcd-cert-path, --etcd-key-path and --etcd-cacert must be given together")]
    IncompleteTlsFlags,
    /// `--etcd-require-tls` was given without any TLS flags.
    #[error("--etcd-require-tls given without --etcd-cert-path, --etcd-key-path and --etcd-cacert")]
    NoTlsFlags,
    /// `--etcd-password` was given without `--etcd-username`.
    #[error("--etcd-password given without --etcd-username")]
    PasswordWithoutUsername,
}

/// Command line arguments for [`EtcdClientConfig::from_args`].
#[derive(clap::Args, Default)]
#[group(id = "comprehensive_etcd_args")]
pub struct Args {
    #[arg(
        long = "etcd-endpoints",
        value_delimiter = ',',
        default_value = DEFAULT_ENDPOINT,
        help = "Comma separated list of etcd endpoints."
    )]
    endpoints: Vec<String>,

    #[arg(
        long = "etcd-cert-path",
        help = "Path to etcd client TLS certificate in PEM format. If unset, connections are not encrypted."
    )]
    cert_path: Option<PathBuf>,

    #[arg(
        long = "etcd-key-path",
        help = "Path to etcd client TLS key in PEM format. If unset, connections are not encrypted."
    )]
    key_path: Option<PathBuf>,

    #[arg(
        long = "etcd-cacert",
        help = "Path to TLS root certificate for verifying etcd servers, in PEM format."
    )]
    cacert: Option<PathBuf>,

    #[arg(long = "etcd-username", help = "Username for etcd authentication.")]
    username: Option<String>,

    #[arg(long = "etcd-password", help = "Password for etcd authentication.")]
    password: Option<String>,

    #[arg(
        long = "etcd-connect-timeout",
        value_parser = humantime::parse_duration,
        help = "Timeout for connecting to etcd, e.g. \"5s\"."
    )]
    connect_timeout: Option<Duration>,

    #[arg(
        long = "etcd-timeout",
        value_parser = humantime::parse_duration,
        help = "Timeout for each etcd request, e.g. \"500ms\"."
    )]
    timeout: Option<Duration>,

    #[arg(
        long = "etcd-require-tls",
        help = "Refuse to start if the TLS files cannot be loaded instead of continuing without TLS."
    )]
    require_tls: bool,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("endpoints", &self.endpoints)
            .field("cert_path", &self.cert_path)
            .field("key_path", &self.key_path)
            .field("cacert", &self.cacert)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout", &self.connect_timeout)
            .field("timeout", &self.timeout)
            .field("require_tls", &self.require_tls)
            .finish()
    }
}
