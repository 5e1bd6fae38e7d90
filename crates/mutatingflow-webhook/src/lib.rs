//! Utility types and functions to serve Kubernetes admission webhooks over HTTPS.
//!
//! The [`WebhookServer`] terminates TLS with a mounted certificate, routes requests through a
//! caller supplied Axum [`Router`] and serves the liveness and readiness probes as well as the
//! Prometheus metrics via plain HTTP.
//! Webhooks, like the [`MutatingWebhook`][1], register their routes on that router.
//!
//! ```no_run
//! use axum::Router;
//! use mutatingflow_webhook::{WebhookOptions, WebhookServer};
//!
//! # async fn docs() -> Result<(), mutatingflow_webhook::WebhookError> {
//! let options = WebhookOptions::builder()
//!     .tls_files("/etc/tls/tls.crt", "/etc/tls/tls.key")
//!     .build();
//!
//! let server = WebhookServer::new(Router::new(), options)?;
//! server.run().await
//! # }
//! ```
//!
//! [1]: crate::servers::MutatingWebhook
use std::net::SocketAddr;

use axum::Router;
use futures_util::future::{Either, select, try_join};
use prometheus::Registry;
use snafu::{ResultExt, Snafu};
use tokio::signal::unix::{SignalKind, signal};
use tower_http::trace::TraceLayer;

use crate::{servers::HealthServerError, tls::TlsServer};

pub mod constants;
pub mod options;
pub mod servers;
pub mod tls;

// Selected re-exports
pub use crate::options::{TlsMount, WebhookOptions};

/// A webhook which can be registered on the [`WebhookServer`] router.
pub trait Webhook {
    /// Adds the routes of the webhook to `router`.
    fn register_routes(&self, router: Router) -> Router;
}

/// A result type alias with the [`WebhookError`] type as the default error type.
pub type Result<T, E = WebhookError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum WebhookError {
    #[snafu(display("failed to create TLS server"))]
    CreateTlsServer { source: tls::TlsServerError },

    #[snafu(display("failed to run TLS server"))]
    RunTlsServer { source: tls::TlsServerError },

    #[snafu(display("failed to run health server"))]
    RunHealthServer { source: HealthServerError },

    #[snafu(display("failed to register {signal} handler"))]
    RegisterSignalHandler {
        source: std::io::Error,
        signal: &'static str,
    },
}

/// A ready-to-use webhook server.
///
/// This server abstracts away lower-level details like TLS termination and request tracing. The
/// routes and their handlers are completely customizable by bringing your own Axum [`Router`].
pub struct WebhookServer {
    tls_server: TlsServer,
    health_socket_addr: SocketAddr,
    metrics: Registry,
}

impl WebhookServer {
    /// Creates a new webhook server.
    ///
    /// The certificate chain and private key are loaded from [`WebhookOptions::tls`] right away,
    /// so a missing or broken mount is reported before anything listens.
    pub fn new(router: Router, options: WebhookOptions) -> Result<Self> {
        tracing::trace!("create new webhook server");

        let router = router.layer(TraceLayer::new_for_http());

        tracing::debug!("create TLS server");
        let tls_server = TlsServer::new(options.socket_addr, router, &options.tls)
            .context(CreateTlsServerSnafu)?;

        Ok(Self {
            tls_server,
            health_socket_addr: options.health_socket_addr,
            metrics: Registry::new(),
        })
    }

    /// Exposes the metrics registered in `metrics` on the health server.
    pub fn with_metrics(mut self, metrics: Registry) -> Self {
        self.metrics = metrics;
        self
    }

    /// Runs the webhook and health servers until SIGINT or SIGTERM is received.
    ///
    /// This does not implement graceful shutdown of the underlying servers.
    pub async fn run(self) -> Result<()> {
        let Self {
            tls_server,
            health_socket_addr,
            metrics,
        } = self;

        let mut sigint = signal(SignalKind::interrupt())
            .context(RegisterSignalHandlerSnafu { signal: "SIGINT" })?;
        let mut sigterm = signal(SignalKind::terminate())
            .context(RegisterSignalHandlerSnafu { signal: "SIGTERM" })?;
        tracing::debug!("created unix signal handlers");

        let future_signal = async {
            let received = match select(Box::pin(sigint.recv()), Box::pin(sigterm.recv())).await {
                Either::Left(_) => "SIGINT",
                Either::Right(_) => "SIGTERM",
            };
            tracing::info!(signal = received, "received signal, shutting down");
        };

        let future_servers = try_join(
            async move { tls_server.run().await.context(RunTlsServerSnafu) },
            async move {
                servers::run_health_server(health_socket_addr, metrics)
                    .await
                    .context(RunHealthServerSnafu)
            },
        );

        match select(Box::pin(future_servers), Box::pin(future_signal)).await {
            Either::Left((result, _)) => result.map(|_| ()),
            Either::Right(((), _)) => Ok(()),
        }
    }
}
