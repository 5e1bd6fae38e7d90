use std::net::SocketAddr;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{Registry, TEXT_FORMAT, TextEncoder};
use snafu::{ResultExt, Snafu};
use tokio::net::TcpListener;

use crate::constants::{LIVENESS_PATH, METRICS_PATH, READINESS_PATH};

#[derive(Debug, Snafu)]
pub enum HealthServerError {
    #[snafu(display("failed to create TCP listener by binding to socket address {socket_addr:?}"))]
    BindHealthListener {
        source: std::io::Error,
        socket_addr: SocketAddr,
    },

    #[snafu(display("failed to serve health endpoints"))]
    ServeHealth { source: std::io::Error },
}

/// The liveness and readiness probe endpoints, plus the Prometheus metrics gathered from
/// `metrics`.
///
/// The process is ready as soon as it listens, as every request is handled without any external
/// dependency.
pub fn health_router(metrics: Registry) -> Router {
    Router::new()
        .route(LIVENESS_PATH, get(|| async { "Alive" }))
        .route(READINESS_PATH, get(|| async { "Ready" }))
        .route(METRICS_PATH, get(scrape))
        .with_state(metrics)
}

async fn scrape(State(metrics): State<Registry>) -> Response {
    match TextEncoder::new().encode_to_string(&metrics.gather()) {
        Ok(text) => ([(CONTENT_TYPE, TEXT_FORMAT)], text).into_response(),
        Err(err) => {
            tracing::error!(%err, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

/// Serves the [`health_router`] via plain HTTP on `socket_addr` until the process is stopped.
pub async fn run_health_server(
    socket_addr: SocketAddr,
    metrics: Registry,
) -> Result<(), HealthServerError> {
    let listener = TcpListener::bind(socket_addr)
        .await
        .context(BindHealthListenerSnafu { socket_addr })?;

    tracing::info!(%socket_addr, "health server listening");
    axum::serve(listener, health_router(metrics))
        .await
        .context(ServeHealthSnafu)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use http::Request;
    use http_body_util::BodyExt;
    use prometheus::{IntCounter, Opts};
    use rstest::{fixture, rstest};
    use tower::ServiceExt;

    use super::*;

    #[fixture]
    fn registry() -> Registry {
        let registry = Registry::new();
        let requests = IntCounter::with_opts(Opts::new("test_requests_total", "Test requests"))
            .expect("valid counter");
        requests.inc_by(3);
        registry
            .register(Box::new(requests))
            .expect("counter must register");
        registry
    }

    async fn fetch(router: Router, path: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(
                Request::get(path)
                    .body(Body::empty())
                    .expect("valid request"),
            )
            .await
            .expect("router is infallible");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body must be readable")
            .to_bytes();
        (
            status,
            String::from_utf8(bytes.to_vec()).expect("body must be UTF-8"),
        )
    }

    #[rstest]
    #[case("/isAlive", StatusCode::OK, "Alive")]
    #[case("/isReady", StatusCode::OK, "Ready")]
    #[case("/healthz", StatusCode::NOT_FOUND, "")]
    #[tokio::test]
    async fn probes(
        registry: Registry,
        #[case] path: &str,
        #[case] status: StatusCode,
        #[case] body: &str,
    ) {
        assert_eq!(fetch(health_router(registry), path).await, (status, body.to_owned()));
    }

    #[rstest]
    #[tokio::test]
    async fn metrics_are_exposed(registry: Registry) {
        let (status, body) = fetch(health_router(registry), "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(
            body.lines().any(|line| line == "test_requests_total 3"),
            "unexpected metrics: {body}"
        );
    }
}
