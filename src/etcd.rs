//! Hand-off of an [`EtcdClientConfig`] to [`etcd_client`].

use etcd_client::{Certificate, Client, ConnectOptions, Identity, TlsOptions};

use crate::EtcdClientConfig;

impl EtcdClientConfig {
    /// [`ConnectOptions`] carrying the credentials, TLS material, timeouts
    /// and keep-alive settings of this configuration.
    ///
    /// An empty username is not sent, matching etcd's own clients.
    pub fn connect_options(&self) -> ConnectOptions {
        let mut options = ConnectOptions::new();
        let credentials = self.credentials();
        if !credentials.is_empty() {
            options = options.with_user(credentials.username(), credentials.password());
        }
        if let Some(tls) = self.tls() {
            let (cert_pem, key_pem) = tls.identity_pem();
            options = options.with_tls(
                TlsOptions::new()
                    .ca_certificate(Certificate::from_pem(tls.ca_pem()))
                    .identity(Identity::from_pem(cert_pem, key_pem)),
            );
        }
        if let Some(timeout) = self.connect_timeout() {
            options = options.with_connect_timeout(timeout);
        }
        if let Some(timeout) = self.timeout() {
            options = options.with_timeout(timeout);
        }
        if let Some((interval, timeout)) = self.keep_alive() {
            options = options.with_keep_alive(interval, timeout);
        }
        options
    }

    /// Connect to the configured endpoints.
    pub async fn connect(&self) -> Result<Client, etcd_client::Error> {
        Client::connect(self.endpoints(), Some(self.connect_options())).await
    }
}
