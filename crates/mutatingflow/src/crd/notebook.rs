use k8s_openapi::api::core::v1::PodSpec;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A Kubeflow notebook server.
///
/// Only the pod template is modelled, as that is the only part of the object the webhook reads
/// or patches. Unknown fields are ignored during deserialization and are left untouched by the
/// generated patches.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "kubeflow.org",
    version = "v1alpha1",
    kind = "Notebook",
    plural = "notebooks",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct NotebookSpec {
    /// The template of the pod the notebook controller creates.
    #[serde(default)]
    pub template: NotebookTemplateSpec,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookTemplateSpec {
    #[serde(default)]
    pub spec: PodSpec,
}
