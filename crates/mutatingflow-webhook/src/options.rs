//! Contains available options to configure the [WebhookServer][crate::WebhookServer].
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
};

use crate::constants::{
    DEFAULT_CERTIFICATE_PATH, DEFAULT_HEALTH_SOCKET_ADDRESS, DEFAULT_PRIVATE_KEY_PATH,
    DEFAULT_SOCKET_ADDRESS,
};

/// Specifies available webhook server options.
///
/// The [`Default`] implementation for this struct contains the following values:
///
/// - The HTTPS socket binds to 0.0.0.0 on port 8443
/// - The health socket binds to 0.0.0.0 on port 8080
/// - The certificate chain and private key are read from `./cert.pem` and `./key.pem`
///
/// ### Example with Custom HTTPS IP Address and Port
///
/// ```
/// use mutatingflow_webhook::WebhookOptions;
///
/// // Set IP address and port at the same time
/// let options = WebhookOptions::builder()
///     .bind_address([127, 0, 0, 1], 12345)
///     .build();
///
/// // Set port only
/// let options = WebhookOptions::builder()
///     .bind_port(12345)
///     .tls_files("/etc/webhook/tls.crt", "/etc/webhook/tls.key")
///     .build();
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookOptions {
    /// The HTTPS socket address the [`TcpListener`][tokio::net::TcpListener] binds to.
    pub socket_addr: SocketAddr,

    /// The plain HTTP socket address of the health endpoints.
    pub health_socket_addr: SocketAddr,

    /// Where the TLS certificate chain and private key are mounted.
    pub tls: TlsMount,
}

/// Paths of the PEM encoded TLS files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsMount {
    pub certificate_path: PathBuf,
    pub private_key_path: PathBuf,
}

impl Default for TlsMount {
    fn default() -> Self {
        Self {
            certificate_path: PathBuf::from(DEFAULT_CERTIFICATE_PATH),
            private_key_path: PathBuf::from(DEFAULT_PRIVATE_KEY_PATH),
        }
    }
}

impl Default for WebhookOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl WebhookOptions {
    /// Returns the default [`WebhookOptionsBuilder`] which allows to selectively
    /// customize the options.
    pub fn builder() -> WebhookOptionsBuilder {
        WebhookOptionsBuilder::default()
    }
}

/// The [`WebhookOptionsBuilder`] which allows to selectively customize the webhook
/// server [`WebhookOptions`].
#[derive(Debug, Default)]
pub struct WebhookOptionsBuilder {
    socket_addr: Option<SocketAddr>,
    health_socket_addr: Option<SocketAddr>,
    tls: Option<TlsMount>,
}

impl WebhookOptionsBuilder {
    /// Sets the socket address the webhook server uses to bind for HTTPS.
    pub fn bind_address(mut self, bind_ip: impl Into<IpAddr>, bind_port: u16) -> Self {
        self.socket_addr = Some(SocketAddr::new(bind_ip.into(), bind_port));
        self
    }

    /// Sets the port of the socket address the webhook server uses to bind for HTTPS.
    pub fn bind_port(mut self, bind_port: u16) -> Self {
        let addr = self.socket_addr.get_or_insert(DEFAULT_SOCKET_ADDRESS);
        addr.set_port(bind_port);
        self
    }

    /// Sets the socket address of the plain HTTP health endpoints.
    pub fn health_address(mut self, socket_addr: impl Into<SocketAddr>) -> Self {
        self.health_socket_addr = Some(socket_addr.into());
        self
    }

    /// Sets the paths of the PEM encoded certificate chain and private key.
    pub fn tls_files(
        mut self,
        certificate_path: impl Into<PathBuf>,
        private_key_path: impl Into<PathBuf>,
    ) -> Self {
        self.tls = Some(TlsMount {
            certificate_path: certificate_path.into(),
            private_key_path: private_key_path.into(),
        });
        self
    }

    /// Builds the final [`WebhookOptions`] by using default values for any not
    /// explicitly set option.
    pub fn build(self) -> WebhookOptions {
        WebhookOptions {
            socket_addr: self.socket_addr.unwrap_or(DEFAULT_SOCKET_ADDRESS),
            health_socket_addr: self
                .health_socket_addr
                .unwrap_or(DEFAULT_HEALTH_SOCKET_ADDRESS),
            tls: self.tls.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = WebhookOptions::default();

        assert_eq!(options.socket_addr.to_string(), "0.0.0.0:8443");
        assert_eq!(options.health_socket_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(options.tls.certificate_path, PathBuf::from("./cert.pem"));
        assert_eq!(options.tls.private_key_path, PathBuf::from("./key.pem"));
    }

    #[test]
    fn bind_port_keeps_default_ip() {
        let options = WebhookOptions::builder().bind_port(9443).build();
        assert_eq!(options.socket_addr.to_string(), "0.0.0.0:9443");
    }

    #[test]
    fn custom_values() {
        let options = WebhookOptions::builder()
            .bind_address([127, 0, 0, 1], 443)
            .health_address(([127, 0, 0, 1], 9090))
            .tls_files("/tls/tls.crt", "/tls/tls.key")
            .build();

        assert_eq!(options.socket_addr.to_string(), "127.0.0.1:443");
        assert_eq!(options.health_socket_addr.to_string(), "127.0.0.1:9090");
        assert_eq!(options.tls, TlsMount {
            certificate_path: PathBuf::from("/tls/tls.crt"),
            private_key_path: PathBuf::from("/tls/tls.key"),
        });
    }
}
