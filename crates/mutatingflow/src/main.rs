use std::sync::Arc;

use axum::Router;
use clap::Parser;
use kube::core::{
    DynamicObject,
    admission::{AdmissionRequest, AdmissionResponse},
};
use mutatingflow::{
    catalog::InjectionCatalog, cli::RunArguments, metrics::AdmissionMetrics, router::Mutator,
};
use mutatingflow_telemetry::Tracing;
use mutatingflow_webhook::{Webhook, WebhookError, WebhookServer, servers::MutatingWebhook};
use prometheus::Registry;
use snafu::{ResultExt, Snafu};
use tracing::info;

const APP_NAME: &str = "mutatingflow";
const MUTATE_PATH: &str = "/mutate";

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize tracing"))]
    InitTracing {
        source: mutatingflow_telemetry::tracing::Error,
    },

    #[snafu(display("failed to register admission metrics"))]
    RegisterMetrics {
        source: mutatingflow::metrics::Error,
    },

    #[snafu(display("failed to create webhook server"))]
    CreateWebhookServer { source: WebhookError },

    #[snafu(display("failed to run webhook server"))]
    RunWebhookServer { source: WebhookError },
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), Error> {
    let arguments = RunArguments::parse();
    let options = arguments.webhook_options();
    let pipeline_marker = arguments.pipeline_marker();

    // The guard flushes and shuts down the exporters when dropped
    let _tracing_guard = Tracing::pre_configured(APP_NAME, arguments.telemetry)
        .init()
        .context(InitTracingSnafu)?;

    info!(
        teams = ?arguments.teams,
        ?pipeline_marker,
        https.address = %options.socket_addr,
        health.address = %options.health_socket_addr,
        "starting {APP_NAME}"
    );

    let registry = Registry::new();
    let metrics = AdmissionMetrics::new(&registry).context(RegisterMetricsSnafu)?;
    let mutator = Arc::new(Mutator::new(
        InjectionCatalog::from(arguments.catalog),
        arguments.teams,
        pipeline_marker,
        metrics,
    ));

    let router = MutatingWebhook::new(MUTATE_PATH, mutate, mutator).register_routes(Router::new());

    WebhookServer::new(router, options)
        .context(CreateWebhookServerSnafu)?
        .with_metrics(registry)
        .run()
        .await
        .context(RunWebhookServerSnafu)
}

async fn mutate(
    mutator: Arc<Mutator>,
    request: AdmissionRequest<DynamicObject>,
) -> AdmissionResponse {
    mutator.route(&request)
}
