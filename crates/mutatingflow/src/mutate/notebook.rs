//! Kubeflow notebooks. Every notebook is mutated, its pod spec lives in `spec.template.spec`.
use k8s_openapi::{api::core::v1::PodSpec, apimachinery::pkg::apis::meta::v1::ObjectMeta};

use super::{ContainerLocator, MutationProfile, Workload};
use crate::{crd::Notebook, patch::PodSpecPointer, policy::Marker};

impl MutationProfile {
    /// The profile for [`Notebook`]s.
    ///
    /// The notebook server is the first container. Besides the Vault secrets it receives the CA
    /// bundle and the proxy environment, and the pod runs as the service account of the team.
    pub fn notebook() -> Self {
        Self {
            kind: "Notebook",
            marker: Marker::Kind,
            pod_spec: PodSpecPointer::TEMPLATE,
            container: ContainerLocator::First,
            ca_bundle: true,
            environment: true,
            service_account: true,
            token_volume_prefix: None,
        }
    }
}

impl Workload for Notebook {
    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn pod_spec(&self) -> Option<&PodSpec> {
        Some(&self.spec.template.spec)
    }
}
