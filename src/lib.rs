//! TLS and credential configuration for etcd clients
//!
//! This crate assembles the connection parameters for an
//! [etcd](https://etcd.io/) client: endpoints, timeouts, username and
//! password, and client TLS material loaded from PEM files on disk. It does
//! not open connections itself; the resulting [`EtcdClientConfig`] is handed
//! to a client library.
//!
//! TLS loading failures are, by default, not fatal: the failure is logged
//! and the configuration continues without TLS. Callers that need
//! encrypted transport select [`TlsFailurePolicy::Require`] or inspect the
//! [`TlsOutcome`] returned by [`EtcdClientConfigBuilder::apply_tls`].
//!
//! # Feature Flags
//!
//! - `etcd`: Enables conversion into
//!   [`etcd_client::ConnectOptions`](https://docs.rs/etcd-client/latest/etcd_client/struct.ConnectOptions.html)
//!   and a `connect` convenience method.

#![warn(missing_docs)]
#![allow(clippy::collapsible_if)]

pub mod config;
pub mod crypto_provider;
#[cfg(feature = "etcd")]
mod etcd;
pub mod tls;

#[cfg(test)]
mod testutil;

pub use config::{
    Args, ConfigError, Credentials, EtcdClientConfig, EtcdClientConfigBuilder, TlsFailurePolicy,
    TlsOutcome,
};
pub use crypto_provider::crypto_provider;
pub use tls::{KeyPairError, TlsConfigError, TlsMaterial};
