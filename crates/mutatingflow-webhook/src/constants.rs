//! Contains various constant definitions, mostly for default ports, addresses and file paths.
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// The default HTTPS port `8443`
pub const DEFAULT_HTTPS_PORT: u16 = 8443;

/// The default HTTP port `8080` of the health endpoints
pub const DEFAULT_HEALTH_PORT: u16 = 8080;

/// The default IP address [`Ipv4Addr::UNSPECIFIED`] (`0.0.0.0`) the servers bind to, which
/// represents binding on all network addresses.
pub const DEFAULT_LISTEN_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// The default socket address `0.0.0.0:8443` the webhook server binds to.
pub const DEFAULT_SOCKET_ADDRESS: SocketAddr =
    SocketAddr::new(DEFAULT_LISTEN_ADDRESS, DEFAULT_HTTPS_PORT);

/// The default socket address `0.0.0.0:8080` the health server binds to.
pub const DEFAULT_HEALTH_SOCKET_ADDRESS: SocketAddr =
    SocketAddr::new(DEFAULT_LISTEN_ADDRESS, DEFAULT_HEALTH_PORT);

/// The default path of the PEM encoded certificate chain.
pub const DEFAULT_CERTIFICATE_PATH: &str = "./cert.pem";

/// The default path of the PEM encoded private key.
pub const DEFAULT_PRIVATE_KEY_PATH: &str = "./key.pem";

/// The path of the liveness probe endpoint.
pub const LIVENESS_PATH: &str = "/isAlive";

/// The path of the readiness probe endpoint.
pub const READINESS_PATH: &str = "/isReady";

/// The path the Prometheus metrics are scraped from.
pub const METRICS_PATH: &str = "/metrics";
