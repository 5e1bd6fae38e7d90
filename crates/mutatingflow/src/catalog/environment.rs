use k8s_openapi::api::core::v1::EnvVar;

use super::vault::env_var;

pub const DEFAULT_PROXY_URL: &str = "http://webproxy.nais:8088";
pub const DEFAULT_NO_PROXY: &str =
    "localhost,127.0.0.1,10.254.0.1,.local,.adeo.no,.nav.no,.aetat.no,.devillo.no,.oera.no,.nais.io";
pub const DEFAULT_DATAVERK_BUCKET_ENDPOINT: &str = "https://dataverk-s3-api.nais.preprod.local";
pub const DEFAULT_REQUESTS_CA_BUNDLE: &str = "/etc/pki/tls/certs/ca-bundle.crt";

/// Proxy and dataverk environment injected into the workload container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvironmentSettings {
    pub proxy_url: String,
    pub no_proxy: String,
    pub dataverk_bucket_endpoint: String,
    pub requests_ca_bundle: String,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            proxy_url: DEFAULT_PROXY_URL.to_owned(),
            no_proxy: DEFAULT_NO_PROXY.to_owned(),
            dataverk_bucket_endpoint: DEFAULT_DATAVERK_BUCKET_ENDPOINT.to_owned(),
            requests_ca_bundle: DEFAULT_REQUESTS_CA_BUNDLE.to_owned(),
        }
    }
}

impl EnvironmentSettings {
    /// The variables in a stable order, so repeated requests yield identical patches.
    pub fn env_vars(&self) -> Vec<EnvVar> {
        vec![
            env_var("REQUESTS_CA_BUNDLE", &self.requests_ca_bundle),
            env_var("DATAVERK_SECRETS_FROM_FILES", "True"),
            env_var("DATAVERK_BUCKET_ENDPOINT", &self.dataverk_bucket_endpoint),
            env_var("NO_PROXY", &self.no_proxy),
            env_var("HTTP_PROXY", &self.proxy_url),
            env_var("HTTPS_PROXY", &self.proxy_url),
        ]
    }
}
