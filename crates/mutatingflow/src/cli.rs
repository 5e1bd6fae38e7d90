//! Command line arguments of the `mutatingflow` binary.
//!
//! Every argument can also be set through the environment variable of the same name, which is
//! how the Deployment configures the webhook.
use std::{net::SocketAddr, path::PathBuf};

use clap::{Args, Parser, ValueEnum};
use mutatingflow_telemetry::TelemetryOptions;
use mutatingflow_webhook::{
    WebhookOptions,
    constants::{
        DEFAULT_CERTIFICATE_PATH, DEFAULT_HEALTH_SOCKET_ADDRESS, DEFAULT_PRIVATE_KEY_PATH,
        DEFAULT_SOCKET_ADDRESS,
    },
};

use crate::{
    catalog::{
        CaBundleSettings, DEFAULT_CA_BUNDLE_NAME, DEFAULT_DATAVERK_BUCKET_ENDPOINT,
        DEFAULT_IMAGE_PULL_SECRET, DEFAULT_NO_PROXY, DEFAULT_PROXY_URL, DEFAULT_VAULT_ADDRESS,
        DEFAULT_VAULT_AUTH_PATH, DEFAULT_VAULT_KV_PATH_PREFIX, DEFAULT_VAULT_SIDECAR_IMAGE,
        EnvironmentSettings, InjectionCatalog, VaultSettings,
    },
    constants::DEFAULT_PIPELINE_MARKER_ANNOTATION,
    policy::Marker,
};

#[derive(Debug, PartialEq, Eq, Parser)]
#[command(name = "mutatingflow", author, version, about, long_about = "")]
pub struct RunArguments {
    /// Path of the PEM encoded TLS certificate chain.
    #[arg(long, env, value_name = "FILE", default_value = DEFAULT_CERTIFICATE_PATH)]
    pub cert: PathBuf,

    /// Path of the PEM encoded TLS private key.
    #[arg(long, env, value_name = "FILE", default_value = DEFAULT_PRIVATE_KEY_PATH)]
    pub key: PathBuf,

    /// Socket address the HTTPS admission endpoint binds to.
    #[arg(long, env, default_value_t = DEFAULT_SOCKET_ADDRESS)]
    pub bind_address: SocketAddr,

    /// Socket address the plain HTTP health endpoints bind to.
    #[arg(long, env, default_value_t = DEFAULT_HEALTH_SOCKET_ADDRESS)]
    pub health_bind_address: SocketAddr,

    /// Comma separated list of team namespaces to mutate. All namespaces are mutated if empty.
    #[arg(long, env, value_delimiter = ',')]
    pub teams: Vec<String>,

    /// Annotation (or label, see --pipeline-marker-kind) marking a pod as a pipeline step.
    #[arg(long, env, default_value = DEFAULT_PIPELINE_MARKER_ANNOTATION)]
    pub pipeline_marker: String,

    /// Whether the pipeline marker is looked up in the annotations or the labels of a pod.
    #[arg(long, env, value_enum, default_value_t)]
    pub pipeline_marker_kind: MarkerKind,

    // IMPORTANT: All (flattened) sub structs should be placed at the end to ensure the help
    // headings are correct.
    #[command(flatten)]
    pub catalog: CatalogOptions,

    #[command(flatten)]
    pub telemetry: TelemetryOptions,
}

impl RunArguments {
    pub fn pipeline_marker(&self) -> Marker {
        let key = self.pipeline_marker.clone();
        match self.pipeline_marker_kind {
            MarkerKind::Annotation => Marker::Annotation(key),
            MarkerKind::Label => Marker::Label(key),
        }
    }

    pub fn webhook_options(&self) -> WebhookOptions {
        WebhookOptions::builder()
            .bind_address(self.bind_address.ip(), self.bind_address.port())
            .health_address(self.health_bind_address)
            .tls_files(&self.cert, &self.key)
            .build()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum MarkerKind {
    #[default]
    Annotation,
    Label,
}

/// Overrides for the injected scaffolding. Everything not listed here uses the built-in
/// defaults.
#[derive(Debug, PartialEq, Eq, Args)]
#[command(next_help_heading = "Injection Options")]
pub struct CatalogOptions {
    /// Address of the Vault server the init container authenticates against.
    #[arg(long, env, default_value = DEFAULT_VAULT_ADDRESS)]
    pub vault_address: String,

    /// Path of the Vault Kubernetes auth method.
    #[arg(long, env, default_value = DEFAULT_VAULT_AUTH_PATH)]
    pub vault_auth_path: String,

    /// Prefix of the team KV paths, the team path is `<prefix>/<team>/<team>`.
    #[arg(long, env, default_value = DEFAULT_VAULT_KV_PATH_PREFIX)]
    pub vault_kv_path_prefix: String,

    /// Image of the Vault init container.
    #[arg(long, env, default_value = DEFAULT_VAULT_SIDECAR_IMAGE)]
    pub vault_sidecar_image: String,

    /// Name of the ConfigMap holding the CA bundle.
    #[arg(long, env, default_value = DEFAULT_CA_BUNDLE_NAME)]
    pub ca_bundle_config_map: String,

    /// Image pull secret added to mutated pods.
    #[arg(long, env, default_value = DEFAULT_IMAGE_PULL_SECRET)]
    pub image_pull_secret: String,

    /// Value of HTTP_PROXY and HTTPS_PROXY.
    #[arg(long, env, default_value = DEFAULT_PROXY_URL)]
    pub proxy_url: String,

    /// Value of NO_PROXY.
    #[arg(long, env, default_value = DEFAULT_NO_PROXY)]
    pub no_proxy: String,

    /// Value of DATAVERK_BUCKET_ENDPOINT.
    #[arg(long, env, default_value = DEFAULT_DATAVERK_BUCKET_ENDPOINT)]
    pub dataverk_bucket_endpoint: String,
}

impl From<CatalogOptions> for InjectionCatalog {
    fn from(options: CatalogOptions) -> Self {
        let CatalogOptions {
            vault_address,
            vault_auth_path,
            vault_kv_path_prefix,
            vault_sidecar_image,
            ca_bundle_config_map,
            image_pull_secret,
            proxy_url,
            no_proxy,
            dataverk_bucket_endpoint,
        } = options;

        Self {
            vault: VaultSettings {
                address: vault_address,
                auth_path: vault_auth_path,
                kv_path_prefix: vault_kv_path_prefix,
                sidecar_image: vault_sidecar_image,
                ..VaultSettings::default()
            },
            ca_bundle: CaBundleSettings {
                config_map_name: ca_bundle_config_map,
                ..CaBundleSettings::default()
            },
            environment: EnvironmentSettings {
                proxy_url,
                no_proxy,
                dataverk_bucket_endpoint,
                ..EnvironmentSettings::default()
            },
            image_pull_secret,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;

        RunArguments::command().print_long_help().unwrap();
        RunArguments::command().debug_assert()
    }

    #[test]
    fn defaults_match_built_in_catalog() {
        let arguments = RunArguments::try_parse_from(["mutatingflow"]).unwrap();

        assert_eq!(arguments.webhook_options(), WebhookOptions::default());
        assert!(arguments.teams.is_empty());
        assert_eq!(
            arguments.pipeline_marker(),
            Marker::Annotation("workflows.argoproj.io/node-name".to_owned())
        );
        assert_eq!(
            InjectionCatalog::from(arguments.catalog),
            InjectionCatalog::default()
        );
    }

    #[test]
    fn teams_are_comma_separated() {
        let arguments =
            RunArguments::try_parse_from(["mutatingflow", "--teams", "team-a,team-b"]).unwrap();
        assert_eq!(arguments.teams, ["team-a", "team-b"]);
    }

    #[test]
    fn pipeline_marker_can_be_a_label() {
        let arguments = RunArguments::try_parse_from([
            "mutatingflow",
            "--pipeline-marker",
            "pipelines.kubeflow.org/step",
            "--pipeline-marker-kind",
            "label",
        ])
        .unwrap();

        assert_eq!(
            arguments.pipeline_marker(),
            Marker::Label("pipelines.kubeflow.org/step".to_owned())
        );
    }

    #[test]
    fn overrides() {
        let arguments = RunArguments::try_parse_from([
            "mutatingflow",
            "--cert",
            "/etc/tls/tls.crt",
            "--key",
            "/etc/tls/tls.key",
            "--bind-address",
            "127.0.0.1:9443",
            "--vault-address",
            "https://vault.example.com",
            "--proxy-url",
            "http://proxy:3128",
        ])
        .unwrap();

        let options = arguments.webhook_options();
        assert_eq!(options.socket_addr.to_string(), "127.0.0.1:9443");
        assert_eq!(options.tls.private_key_path, PathBuf::from("/etc/tls/tls.key"));

        let catalog = InjectionCatalog::from(arguments.catalog);
        assert_eq!(catalog.vault.address, "https://vault.example.com");
        assert_eq!(catalog.vault.auth_path, "/kubernetes/prod/kubeflow");
        assert_eq!(catalog.environment.proxy_url, "http://proxy:3128");
    }
}
