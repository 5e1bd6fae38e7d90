use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, EnvVar, SecurityContext, Volume, VolumeMount,
};

pub const DEFAULT_VAULT_ADDRESS: &str = "https://vault.adeo.no";
pub const DEFAULT_VAULT_AUTH_PATH: &str = "/kubernetes/prod/kubeflow";
pub const DEFAULT_VAULT_KV_PATH_PREFIX: &str = "/kv/prod/kubeflow";
pub const DEFAULT_VAULT_SIDECAR_IMAGE: &str = "navikt/vks:46";
pub const DEFAULT_VAULT_SIDECAR_NAME: &str = "vks";
pub const DEFAULT_VAULT_SECRETS_VOLUME_NAME: &str = "vault-secrets";
pub const DEFAULT_VAULT_SECRETS_PATH: &str = "/var/run/secrets/nais.io/vault";

/// Settings of the `vks` init container, which fetches the team secrets from Vault into an
/// in-memory volume before the workload starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VaultSettings {
    pub address: String,
    pub auth_path: String,

    /// The team specific KV path is `<kv_path_prefix>/<team>/<team>`.
    pub kv_path_prefix: String,

    pub sidecar_image: String,
    pub sidecar_name: String,
    pub volume_name: String,
    pub secrets_path: String,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            address: DEFAULT_VAULT_ADDRESS.to_owned(),
            auth_path: DEFAULT_VAULT_AUTH_PATH.to_owned(),
            kv_path_prefix: DEFAULT_VAULT_KV_PATH_PREFIX.to_owned(),
            sidecar_image: DEFAULT_VAULT_SIDECAR_IMAGE.to_owned(),
            sidecar_name: DEFAULT_VAULT_SIDECAR_NAME.to_owned(),
            volume_name: DEFAULT_VAULT_SECRETS_VOLUME_NAME.to_owned(),
            secrets_path: DEFAULT_VAULT_SECRETS_PATH.to_owned(),
        }
    }
}

impl VaultSettings {
    /// The memory backed volume the secrets are written to.
    pub fn volume(&self) -> Volume {
        Volume {
            name: self.volume_name.clone(),
            empty_dir: Some(EmptyDirVolumeSource {
                medium: Some("Memory".to_owned()),
                ..EmptyDirVolumeSource::default()
            }),
            ..Volume::default()
        }
    }

    pub fn volume_mount(&self) -> VolumeMount {
        VolumeMount {
            name: self.volume_name.clone(),
            mount_path: self.secrets_path.clone(),
            ..VolumeMount::default()
        }
    }

    pub fn kv_path(&self, team: &str) -> String {
        format!(
            "{prefix}/{team}/{team}",
            prefix = self.kv_path_prefix.trim_end_matches('/')
        )
    }

    /// Builds the init container for `team`.
    ///
    /// The team doubles as the Vault role. `extra_volume_mounts` are appended after the secrets
    /// mount, which is used to hand the service account token to the container.
    pub fn init_container(&self, team: &str, extra_volume_mounts: Vec<VolumeMount>) -> Container {
        let mut volume_mounts = vec![self.volume_mount()];
        volume_mounts.extend(extra_volume_mounts);

        Container {
            name: self.sidecar_name.clone(),
            image: Some(self.sidecar_image.clone()),
            env: Some(vec![
                env_var("VKS_VAULT_ADDR", &self.address),
                env_var("VKS_AUTH_PATH", &self.auth_path),
                env_var("VKS_KV_PATH", &self.kv_path(team)),
                env_var("VKS_VAULT_ROLE", team),
                env_var("VKS_SECRET_DEST_PATH", &self.secrets_path),
            ]),
            volume_mounts: Some(volume_mounts),
            security_context: Some(SecurityContext {
                allow_privilege_escalation: Some(false),
                ..SecurityContext::default()
            }),
            ..Container::default()
        }
    }
}

pub(crate) fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_owned(),
        value: Some(value.to_owned()),
        ..EnvVar::default()
    }
}
