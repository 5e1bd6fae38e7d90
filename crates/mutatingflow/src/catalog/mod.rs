//! The declarative scaffolding injected into workloads.
//!
//! The [`InjectionCatalog`] is built once at start-up and only read afterwards, so it can be
//! shared between all concurrently handled admission requests. Every entry is identified by a
//! stable name and the `missing_*` functions only ever return entries which are not yet present
//! by that name. This keeps the generated patches idempotent even when the status annotation was
//! stripped from an object.
use k8s_openapi::api::core::v1::{Container, EnvVar, LocalObjectReference, Volume, VolumeMount};

mod ca_bundle;
mod environment;
mod vault;

pub use ca_bundle::*;
pub use environment::*;
pub use vault::*;

/// The name of the image pull secret referenced by mutated pods.
pub const DEFAULT_IMAGE_PULL_SECRET: &str = "gpr-credentials";

/// Everything the patch builders inject, parameterized by per-request values such as the team.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InjectionCatalog {
    pub vault: VaultSettings,
    pub ca_bundle: CaBundleSettings,
    pub environment: EnvironmentSettings,

    /// Name of the image pull secret added to `spec.imagePullSecrets`.
    pub image_pull_secret: String,
}

impl Default for InjectionCatalog {
    fn default() -> Self {
        Self {
            vault: VaultSettings::default(),
            ca_bundle: CaBundleSettings::default(),
            environment: EnvironmentSettings::default(),
            image_pull_secret: DEFAULT_IMAGE_PULL_SECRET.to_owned(),
        }
    }
}

impl InjectionCatalog {
    /// Returns the catalog volumes not yet declared in `existing`, in catalog order.
    ///
    /// The CA bundle volume is only considered when `with_ca_bundle` is set.
    pub fn missing_volumes(&self, existing: &[Volume], with_ca_bundle: bool) -> Vec<Volume> {
        let mut wanted = vec![self.vault.volume()];
        if with_ca_bundle {
            wanted.push(self.ca_bundle.volume());
        }

        missing(existing, wanted)
    }

    /// Returns the volume mounts the workload container is missing.
    ///
    /// The CA bundle contributes several mounts sharing one volume name, so they are added as a
    /// group: either all of them (the volume is not mounted at all) or none.
    pub fn missing_volume_mounts(
        &self,
        existing: &[VolumeMount],
        with_ca_bundle: bool,
    ) -> Vec<VolumeMount> {
        let mut mounts = missing(existing, vec![self.vault.volume_mount()]);

        if with_ca_bundle && !contains_named(existing, &self.ca_bundle.volume_name) {
            mounts.extend(self.ca_bundle.volume_mounts());
        }

        mounts
    }

    /// Returns the environment variables the workload container does not declare yet.
    pub fn missing_env(&self, existing: &[EnvVar]) -> Vec<EnvVar> {
        missing(existing, self.environment.env_vars())
    }

    /// Returns the image pull secret reference unless it is already present.
    pub fn missing_image_pull_secret(
        &self,
        existing: &[LocalObjectReference],
    ) -> Option<LocalObjectReference> {
        (!contains_named(existing, &self.image_pull_secret)).then(|| LocalObjectReference {
            name: self.image_pull_secret.clone(),
        })
    }
}

/// Objects in a pod spec that are unique by name within their list.
pub trait Named {
    fn name(&self) -> &str;
}

impl Named for Volume {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for VolumeMount {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for EnvVar {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Container {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for LocalObjectReference {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Linear scan, the lists in a pod spec only hold a handful of entries.
pub fn contains_named<T: Named>(items: &[T], name: &str) -> bool {
    items.iter().any(|item| item.name() == name)
}

fn missing<T: Named>(existing: &[T], wanted: Vec<T>) -> Vec<T> {
    wanted
        .into_iter()
        .filter(|item| !contains_named(existing, item.name()))
        .collect()
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn catalog() -> InjectionCatalog {
        InjectionCatalog::default()
    }

    fn volume(name: &str) -> Volume {
        Volume {
            name: name.to_owned(),
            ..Volume::default()
        }
    }

    fn mount(name: &str, path: &str) -> VolumeMount {
        VolumeMount {
            name: name.to_owned(),
            mount_path: path.to_owned(),
            ..VolumeMount::default()
        }
    }

    fn names<T: Named>(items: &[T]) -> Vec<&str> {
        items.iter().map(Named::name).collect()
    }

    #[rstest]
    #[case(&[], true, &["vault-secrets", "ca-bundle"])]
    #[case(&[], false, &["vault-secrets"])]
    #[case(&["vault-secrets"], true, &["ca-bundle"])]
    #[case(&["ca-bundle", "data"], true, &["vault-secrets"])]
    #[case(&["vault-secrets", "ca-bundle"], true, &[])]
    fn missing_volumes(
        catalog: InjectionCatalog,
        #[case] existing: &[&str],
        #[case] with_ca_bundle: bool,
        #[case] expected: &[&str],
    ) {
        let existing: Vec<_> = existing.iter().map(|name| volume(name)).collect();
        let missing = catalog.missing_volumes(&existing, with_ca_bundle);
        assert_eq!(names(&missing), expected);
    }

    #[rstest]
    fn missing_volume_mounts_on_bare_container(catalog: InjectionCatalog) {
        let mounts = catalog.missing_volume_mounts(&[], true);

        // One vault mount, five PEM bundle locations and the Java trust store
        assert_eq!(mounts.len(), 7);
        assert_eq!(mounts[0].name, "vault-secrets");
        assert_eq!(mounts[0].mount_path, "/var/run/secrets/nais.io/vault");
        assert!(mounts[1..].iter().all(|m| m.name == "ca-bundle"));
        assert_eq!(
            mounts.last().map(|m| m.mount_path.as_str()),
            Some("/etc/ssl/certs/java/cacerts")
        );
    }

    #[rstest]
    fn missing_volume_mounts_is_idempotent(catalog: InjectionCatalog) {
        let first = catalog.missing_volume_mounts(&[], true);
        let second = catalog.missing_volume_mounts(&first, true);
        assert!(second.is_empty());
    }

    #[rstest]
    fn partially_mounted_ca_bundle_is_left_alone(catalog: InjectionCatalog) {
        let existing = vec![mount("ca-bundle", "/etc/ssl/certs/ca-certificates.crt")];
        let mounts = catalog.missing_volume_mounts(&existing, true);
        assert_eq!(names(&mounts), ["vault-secrets"]);
    }

    #[rstest]
    fn missing_env_skips_declared_variables(catalog: InjectionCatalog) {
        let existing = vec![EnvVar {
            name: "HTTPS_PROXY".to_owned(),
            value: Some("http://my-proxy:3128".to_owned()),
            ..EnvVar::default()
        }];

        let missing = catalog.missing_env(&existing);
        assert_eq!(
            names(&missing),
            [
                "REQUESTS_CA_BUNDLE",
                "DATAVERK_SECRETS_FROM_FILES",
                "DATAVERK_BUCKET_ENDPOINT",
                "NO_PROXY",
                "HTTP_PROXY"
            ]
        );
    }

    #[rstest]
    fn missing_image_pull_secret(catalog: InjectionCatalog) {
        assert_eq!(
            catalog.missing_image_pull_secret(&[]),
            Some(LocalObjectReference {
                name: "gpr-credentials".to_owned()
            })
        );

        let existing = vec![LocalObjectReference {
            name: "gpr-credentials".to_owned(),
        }];
        assert_eq!(catalog.missing_image_pull_secret(&existing), None);
    }
}
