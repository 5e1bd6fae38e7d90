use k8s_openapi::api::core::v1::{ConfigMapVolumeSource, Volume, VolumeMount};

pub const DEFAULT_CA_BUNDLE_NAME: &str = "ca-bundle";

/// Locations where the common TLS stacks look for a PEM CA bundle. Mounting the bundle in all of
/// them makes CA injection work regardless of the base image distribution.
pub const PEM_BUNDLE_PATHS: [&str; 5] = [
    // Debian/Ubuntu/Gentoo etc.
    "/etc/ssl/certs/ca-certificates.crt",
    // Fedora/RHEL 6
    "/etc/pki/tls/certs/ca-bundle.crt",
    // OpenSUSE
    "/etc/ssl/ca-bundle.pem",
    // OpenELEC
    "/etc/pki/tls/cacert.pem",
    // CentOS/RHEL 7
    "/etc/pki/ca-trust/extracted/pem/tls-ca-bundle.pem",
];

pub const JAVA_TRUST_STORE_PATH: &str = "/etc/ssl/certs/java/cacerts";

const PEM_BUNDLE_KEY: &str = "ca-bundle.pem";
const JKS_BUNDLE_KEY: &str = "ca-bundle.jks";

/// The CA bundle ConfigMap and where its keys are mounted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaBundleSettings {
    pub config_map_name: String,
    pub volume_name: String,
}

impl Default for CaBundleSettings {
    fn default() -> Self {
        Self {
            config_map_name: DEFAULT_CA_BUNDLE_NAME.to_owned(),
            volume_name: DEFAULT_CA_BUNDLE_NAME.to_owned(),
        }
    }
}

impl CaBundleSettings {
    pub fn volume(&self) -> Volume {
        Volume {
            name: self.volume_name.clone(),
            config_map: Some(ConfigMapVolumeSource {
                name: self.config_map_name.clone(),
                ..ConfigMapVolumeSource::default()
            }),
            ..Volume::default()
        }
    }

    /// All mounts of the bundle volume: the PEM bundle at every well-known location and the JKS
    /// trust store for Java.
    pub fn volume_mounts(&self) -> Vec<VolumeMount> {
        PEM_BUNDLE_PATHS
            .iter()
            .map(|path| self.volume_mount(path, PEM_BUNDLE_KEY))
            .chain(std::iter::once(
                self.volume_mount(JAVA_TRUST_STORE_PATH, JKS_BUNDLE_KEY),
            ))
            .collect()
    }

    fn volume_mount(&self, mount_path: &str, key: &str) -> VolumeMount {
        VolumeMount {
            name: self.volume_name.clone(),
            mount_path: mount_path.to_owned(),
            sub_path: Some(key.to_owned()),
            ..VolumeMount::default()
        }
    }
}
