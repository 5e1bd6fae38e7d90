//! Builds the JSON patch which injects the [`InjectionCatalog`] into a workload.
//!
//! There is only one builder. The differences between the supported kinds (where the pod spec
//! lives, which container is the workload container, which marker qualifies an object) are
//! captured by a [`MutationProfile`], see [`notebook`] and [`pipeline`].
use json_patch::{Patch, PatchOperation};
use k8s_openapi::{
    api::core::v1::{Container, PodSpec, Volume, VolumeMount},
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use kube::core::{
    DynamicObject,
    admission::{AdmissionRequest, AdmissionResponse, SerializePatchError},
};
use serde::de::DeserializeOwned;
use snafu::{OptionExt, Report, ResultExt, Snafu};
use tracing::{info, warn};

use crate::{
    catalog::{InjectionCatalog, contains_named},
    constants::SERVICE_ACCOUNT_TOKEN_PATH,
    patch::{self, PodSpecPointer, append_all, patch_status_annotation},
    policy::{Marker, mutation_required},
};

pub mod notebook;
pub mod pipeline;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to deserialize object as {kind}"))]
    DeserializeObject {
        source: serde_json::Error,
        kind: &'static str,
    },

    #[snafu(display("{kind} does not declare any containers"))]
    NoContainers { kind: &'static str },

    #[snafu(display("{kind} has no container named {name:?}"))]
    MissingContainer { kind: &'static str, name: &'static str },

    #[snafu(display("{kind} has no volume with a name starting with {prefix:?}"))]
    MissingTokenVolume {
        kind: &'static str,
        prefix: &'static str,
    },

    #[snafu(display("failed to build patch operation"))]
    BuildPatch { source: patch::Error },

    #[snafu(display("failed to serialize JSON patch"))]
    SerializePatch { source: SerializePatchError },
}

/// How the workload container is found in `spec.containers`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerLocator {
    /// The first declared container.
    First,

    /// The container with exactly this name.
    Named(&'static str),
}

impl ContainerLocator {
    fn locate<'a>(
        &self,
        kind: &'static str,
        containers: &'a [Container],
    ) -> Result<(usize, &'a Container)> {
        match self {
            Self::First => containers
                .first()
                .map(|container| (0, container))
                .context(NoContainersSnafu { kind }),
            Self::Named(name) => containers
                .iter()
                .enumerate()
                .find(|(_, container)| container.name == *name)
                .context(MissingContainerSnafu { kind, name: *name }),
        }
    }
}

/// The per-kind configuration of the builder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationProfile {
    /// The object kind as sent in the admission request, e.g. `Pod`.
    pub kind: &'static str,

    /// What qualifies an object of this kind for mutation.
    pub marker: Marker,

    /// Where the pod spec lives within the object.
    pub pod_spec: PodSpecPointer,

    pub container: ContainerLocator,

    /// Mount the CA bundle into the workload container.
    pub ca_bundle: bool,

    /// Add the proxy and dataverk environment to the workload container.
    pub environment: bool,

    /// Run the pod with the service account named after the team.
    pub service_account: bool,

    /// Prefix of the service account token volume which is handed to the Vault init container.
    pub token_volume_prefix: Option<&'static str>,
}

/// A typed object carrying a pod spec, as deserialized from the admission request.
pub trait Workload: DeserializeOwned {
    fn metadata(&self) -> &ObjectMeta;

    fn pod_spec(&self) -> Option<&PodSpec>;
}

/// Per-request values the builder needs besides the object itself.
#[derive(Clone, Copy, Debug)]
pub struct MutationContext<'a> {
    /// The team owning the object. Derived from the namespace.
    pub team: &'a str,

    pub catalog: &'a InjectionCatalog,
}

/// Mutates the `object` of `request` according to `profile` and returns the admission response.
///
/// The response is allowed without a patch if the object doesn't need to be mutated, allowed with
/// a patch if it does. Any failure denies the request with the rendered error chain as message.
pub fn build<W: Workload>(
    profile: &MutationProfile,
    request: &AdmissionRequest<DynamicObject>,
    object: &DynamicObject,
    context: MutationContext<'_>,
) -> AdmissionResponse {
    let response = AdmissionResponse::from(request);

    let result = patch_for::<W>(profile, object, context).and_then(|patch| match patch {
        Some(patch) => response.clone().with_patch(patch).context(SerializePatchSnafu),
        None => Ok(response.clone()),
    });

    result.unwrap_or_else(|err| {
        let message = Report::from_error(err).to_string();
        warn!(
            k8s.kind = profile.kind,
            k8s.namespace = request.namespace.as_deref(),
            k8s.name = request.name.as_str(),
            error = message.as_str(),
            "denying admission request"
        );
        response.deny(message)
    })
}

/// Returns the patch for `object`, or [`None`] if it doesn't need to be mutated.
pub fn patch_for<W: Workload>(
    profile: &MutationProfile,
    object: &DynamicObject,
    context: MutationContext<'_>,
) -> Result<Option<Patch>> {
    let workload: W = serde_json::to_value(object)
        .and_then(serde_json::from_value)
        .context(DeserializeObjectSnafu { kind: profile.kind })?;
    let metadata = workload.metadata();

    if !mutation_required(metadata, &profile.marker) {
        info!(
            k8s.kind = profile.kind,
            k8s.namespace = metadata.namespace.as_deref(),
            k8s.name = metadata.name.as_deref(),
            "skipping mutation due to policy check"
        );
        return Ok(None);
    }

    let default_spec = PodSpec::default();
    let pod_spec = workload.pod_spec().unwrap_or(&default_spec);
    let operations = operations(profile, metadata, pod_spec, context)?;

    info!(
        k8s.kind = profile.kind,
        k8s.namespace = metadata.namespace.as_deref(),
        k8s.name = metadata.name.as_deref(),
        operations = operations.len(),
        "mutated"
    );

    Ok(Some(Patch(operations)))
}

/// Computes the ordered patch operations.
///
/// Volumes come first, followed by the init container, the workload container, the service
/// account and the image pull secrets. The status annotation is always the last operation.
fn operations(
    profile: &MutationProfile,
    metadata: &ObjectMeta,
    pod_spec: &PodSpec,
    context: MutationContext<'_>,
) -> Result<Vec<PatchOperation>> {
    let MutationContext { team, catalog } = context;
    let pointer = profile.pod_spec;

    // Preconditions are checked before anything is assembled
    let (index, container) = profile.container.locate(profile.kind, &pod_spec.containers)?;
    let volumes = pod_spec.volumes.as_deref().unwrap_or_default();
    let token_volume = profile
        .token_volume_prefix
        .map(|prefix| find_token_volume(profile.kind, volumes, prefix))
        .transpose()?;

    let mut operations = append_all(
        pointer.field("volumes"),
        !volumes.is_empty(),
        catalog.missing_volumes(volumes, profile.ca_bundle),
    )
    .context(BuildPatchSnafu)?;

    let init_containers = pod_spec.init_containers.as_deref().unwrap_or_default();
    if !contains_named(init_containers, &catalog.vault.sidecar_name) {
        let token_mounts = token_volume
            .map(|volume| {
                vec![VolumeMount {
                    name: volume.name.clone(),
                    mount_path: SERVICE_ACCOUNT_TOKEN_PATH.to_owned(),
                    read_only: Some(true),
                    ..VolumeMount::default()
                }]
            })
            .unwrap_or_default();

        operations.extend(
            append_all(
                pointer.field("initContainers"),
                !init_containers.is_empty(),
                vec![catalog.vault.init_container(team, token_mounts)],
            )
            .context(BuildPatchSnafu)?,
        );
    }

    if let Some(container) = mutate_container(profile, catalog, container) {
        operations.push(
            patch::replace(pointer.element("containers", index), container)
                .context(BuildPatchSnafu)?,
        );
    }

    if profile.service_account && pod_spec.service_account_name.as_deref() != Some(team) {
        operations
            .push(patch::add(pointer.field("serviceAccountName"), team).context(BuildPatchSnafu)?);
    }

    let image_pull_secrets = pod_spec.image_pull_secrets.as_deref().unwrap_or_default();
    operations.extend(
        append_all(
            pointer.field("imagePullSecrets"),
            !image_pull_secrets.is_empty(),
            catalog
                .missing_image_pull_secret(image_pull_secrets)
                .into_iter()
                .collect(),
        )
        .context(BuildPatchSnafu)?,
    );

    operations.push(patch_status_annotation(metadata.annotations.as_ref()));
    Ok(operations)
}

/// Returns the mutated copy of the workload container, or [`None`] if nothing is missing.
fn mutate_container(
    profile: &MutationProfile,
    catalog: &InjectionCatalog,
    container: &Container,
) -> Option<Container> {
    let volume_mounts = container.volume_mounts.as_deref().unwrap_or_default();
    let missing_mounts = catalog.missing_volume_mounts(volume_mounts, profile.ca_bundle);

    let missing_env = if profile.environment {
        catalog.missing_env(container.env.as_deref().unwrap_or_default())
    } else {
        Vec::new()
    };

    if missing_mounts.is_empty() && missing_env.is_empty() {
        return None;
    }

    let mut container = container.clone();
    if !missing_mounts.is_empty() {
        container
            .volume_mounts
            .get_or_insert_with(Vec::new)
            .extend(missing_mounts);
    }
    if !missing_env.is_empty() {
        container.env.get_or_insert_with(Vec::new).extend(missing_env);
    }

    Some(container)
}

fn find_token_volume<'a>(
    kind: &'static str,
    volumes: &'a [Volume],
    prefix: &'static str,
) -> Result<&'a Volume> {
    volumes
        .iter()
        .find(|volume| volume.name.starts_with(prefix))
        .context(MissingTokenVolumeSnafu { kind, prefix })
}

#[cfg(test)]
pub(crate) mod test_utils {
    use kube::core::admission::AdmissionReview;
    use serde_json::Value;

    use super::*;

    /// Wraps `object` into an admission request for `kind` in `namespace`.
    pub fn admission_request(
        kind: &str,
        namespace: &str,
        object: Value,
    ) -> AdmissionRequest<DynamicObject> {
        let review: AdmissionReview<DynamicObject> = serde_json::from_value(serde_json::json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
                "kind": { "group": "", "version": "v1", "kind": kind },
                "resource": { "group": "", "version": "v1", "resource": "pods" },
                "name": object["metadata"]["name"],
                "namespace": namespace,
                "operation": "CREATE",
                "userInfo": { "username": "system:serviceaccount:kubeflow:pipeline-runner" },
                "object": object,
                "dryRun": false
            }
        }))
        .expect("admission review must be valid");

        review.try_into().expect("admission review must carry a request")
    }

    /// Decodes the JSON patch carried by `response`, if any.
    pub fn patch_of(response: &AdmissionResponse) -> Option<Vec<Value>> {
        response
            .patch
            .as_deref()
            .map(|patch| serde_json::from_slice(patch).expect("patch must be JSON"))
    }
}
