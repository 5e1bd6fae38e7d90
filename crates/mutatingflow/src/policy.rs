//! The gate deciding whether an object needs to be mutated at all.
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::constants::{STATUS_ANNOTATION_KEY, STATUS_INJECTED};

/// What qualifies an object for mutation, in addition to not being mutated already.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Marker {
    /// The object kind alone qualifies, e.g. every notebook is mutated.
    Kind,

    /// Only objects carrying this label are mutated, e.g. pipeline step pods with
    /// `--pipeline-marker-kind label`.
    Label(String),

    /// Only objects carrying this annotation are mutated, e.g. pipeline step pods.
    Annotation(String),
}

impl Marker {
    /// Whether the marker is present on the object. Missing maps count as empty.
    pub fn is_present(&self, metadata: &ObjectMeta) -> bool {
        match self {
            Self::Kind => true,
            Self::Label(key) => metadata
                .labels
                .as_ref()
                .is_some_and(|labels| labels.contains_key(key)),
            Self::Annotation(key) => metadata
                .annotations
                .as_ref()
                .is_some_and(|annotations| annotations.contains_key(key)),
        }
    }
}

/// Returns the value of the status annotation, if set.
pub fn status(metadata: &ObjectMeta) -> Option<&str> {
    metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(STATUS_ANNOTATION_KEY))
        .map(String::as_str)
}

/// Whether the object was already mutated, i.e. the status annotation reads `injected` in any
/// casing.
pub fn is_injected(metadata: &ObjectMeta) -> bool {
    status(metadata).is_some_and(|status| status.eq_ignore_ascii_case(STATUS_INJECTED))
}

/// Decides whether the object described by `metadata` needs to be mutated.
///
/// Objects without the `marker` are never mutated, objects already marked as injected don't need
/// to be mutated again. This never fails, malformed or missing maps are treated as empty.
pub fn mutation_required(metadata: &ObjectMeta, marker: &Marker) -> bool {
    let namespace = metadata.namespace.as_deref().unwrap_or_default();
    let name = metadata.name.as_deref().unwrap_or_default();

    if !marker.is_present(metadata) {
        tracing::debug!(
            k8s.namespace = namespace,
            k8s.name = name,
            ?marker,
            "marker not present, mutation not applicable"
        );
        return false;
    }

    let required = !is_injected(metadata);
    tracing::debug!(
        k8s.namespace = namespace,
        k8s.name = name,
        status = status(metadata),
        required,
        "evaluated mutation policy"
    );

    required
}
