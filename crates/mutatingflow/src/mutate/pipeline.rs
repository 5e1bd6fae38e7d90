//! Pods running Kubeflow pipeline steps, identified by default by the annotation Argo puts on
//! workflow pods.
use k8s_openapi::{
    api::core::v1::{Pod, PodSpec},
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};

use super::{ContainerLocator, MutationProfile, Workload};
use crate::{
    constants::{PIPELINE_MAIN_CONTAINER_NAME, PIPELINE_TOKEN_VOLUME_PREFIX},
    patch::PodSpecPointer,
    policy::Marker,
};

impl MutationProfile {
    /// The profile for pipeline step pods carrying the `marker` label or annotation.
    ///
    /// Only the `main` container runs user code, the Argo sidecars are left untouched. The pod
    /// declares a volume with the service account token of the pipeline runner, which the Vault
    /// init container needs to log in.
    pub fn pipeline_pod(marker: Marker) -> Self {
        Self {
            kind: "Pod",
            marker,
            pod_spec: PodSpecPointer::POD,
            container: ContainerLocator::Named(PIPELINE_MAIN_CONTAINER_NAME),
            ca_bundle: false,
            environment: false,
            service_account: false,
            token_volume_prefix: Some(PIPELINE_TOKEN_VOLUME_PREFIX),
        }
    }
}

impl Workload for Pod {
    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn pod_spec(&self) -> Option<&PodSpec> {
        self.spec.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use kube::core::admission::AdmissionResponse;
    use rstest::{fixture, rstest};
    use serde_json::{Value, json};

    use super::*;
    use crate::{
        catalog::InjectionCatalog,
        constants::DEFAULT_PIPELINE_MARKER_ANNOTATION,
        mutate::{
            MutationContext, build,
            test_utils::{admission_request, patch_of},
        },
    };

    #[fixture]
    fn catalog() -> InjectionCatalog {
        InjectionCatalog::default()
    }

    fn token_volume() -> Value {
        json!({ "name": "pipeline-runner-token-x7k2p", "secret": { "secretName": "pipeline-runner-token-x7k2p" } })
    }

    fn pod(annotations: Value, containers: Value, volumes: Value) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": "train-model-1234",
                "namespace": "team-a",
                "annotations": annotations
            },
            "spec": {
                "containers": containers,
                "volumes": volumes
            }
        })
    }

    fn step_annotations() -> Value {
        json!({ DEFAULT_PIPELINE_MARKER_ANNOTATION: "train-model" })
    }

    fn mutate(catalog: &InjectionCatalog, object: Value) -> AdmissionResponse {
        let marker = Marker::Annotation(DEFAULT_PIPELINE_MARKER_ANNOTATION.to_owned());
        mutate_marked(catalog, marker, object)
    }

    fn mutate_marked(
        catalog: &InjectionCatalog,
        marker: Marker,
        object: Value,
    ) -> AdmissionResponse {
        let request = admission_request("Pod", "team-a", object);
        let object = request.object.clone().expect("request must carry an object");
        build::<Pod>(
            &MutationProfile::pipeline_pod(marker),
            &request,
            &object,
            MutationContext {
                team: "team-a",
                catalog,
            },
        )
    }

    #[rstest]
    fn pipeline_step_is_mutated(catalog: InjectionCatalog) {
        let response = mutate(
            &catalog,
            pod(
                step_annotations(),
                json!([{ "name": "wait" }, { "name": "main", "image": "python:3" }]),
                json!([token_volume()]),
            ),
        );

        assert!(response.allowed);
        let patch = patch_of(&response).expect("pod must be patched");
        let paths: Vec<&str> = patch.iter().filter_map(|op| op["path"].as_str()).collect();
        assert_eq!(paths, [
            "/spec/volumes/-",
            "/spec/initContainers",
            "/spec/containers/1",
            "/spec/imagePullSecrets",
            "/metadata/annotations/mutatingflow.nais.io~1status",
        ]);

        let vks = &patch[1]["value"][0];
        assert_eq!(vks["name"], "vks");
        assert_eq!(vks["volumeMounts"], json!([
            { "name": "vault-secrets", "mountPath": "/var/run/secrets/nais.io/vault" },
            {
                "name": "pipeline-runner-token-x7k2p",
                "mountPath": "/var/run/secrets/kubernetes.io/serviceaccount",
                "readOnly": true
            }
        ]));

        let main = &patch[2]["value"];
        assert_eq!(main["name"], "main");
        assert_eq!(main["image"], "python:3");
        assert_eq!(main["volumeMounts"], json!([
            { "name": "vault-secrets", "mountPath": "/var/run/secrets/nais.io/vault" }
        ]));
        assert!(main.get("env").is_none());
    }

    #[rstest]
    fn injected_pod_is_left_alone(catalog: InjectionCatalog) {
        let response = mutate(
            &catalog,
            pod(
                json!({ "mutatingflow.nais.io/status": "injected" }),
                json!([{ "name": "main" }]),
                json!([token_volume()]),
            ),
        );

        assert!(response.allowed);
        assert!(patch_of(&response).is_none());
    }

    #[rstest]
    fn pod_without_marker_is_left_alone(catalog: InjectionCatalog) {
        let response = mutate(
            &catalog,
            pod(
                json!({ "owner": "team-a" }),
                json!([{ "name": "main" }]),
                json!([token_volume()]),
            ),
        );

        assert!(response.allowed);
        assert!(patch_of(&response).is_none());
    }

    #[rstest]
    fn pod_without_main_container_is_denied(catalog: InjectionCatalog) {
        let response = mutate(
            &catalog,
            pod(
                step_annotations(),
                json!([{ "name": "wait" }, { "name": "init" }]),
                json!([token_volume()]),
            ),
        );

        assert!(!response.allowed);
        assert!(response.patch.is_none());
        assert!(
            response.result.message.contains(r#"Pod has no container named "main""#),
            "unexpected message: {}",
            response.result.message
        );
    }

    #[rstest]
    fn pod_without_token_volume_is_denied(catalog: InjectionCatalog) {
        let response = mutate(
            &catalog,
            pod(step_annotations(), json!([{ "name": "main" }]), json!([])),
        );

        assert!(!response.allowed);
        assert!(response.patch.is_none());
        assert!(
            response.result.message.contains("pipeline-runner-token"),
            "unexpected message: {}",
            response.result.message
        );
    }

    #[rstest]
    fn resubmitted_pod_gets_no_duplicates(catalog: InjectionCatalog) {
        let response = mutate(
            &catalog,
            pod(
                step_annotations(),
                json!([{
                    "name": "main",
                    "volumeMounts": [{ "name": "vault-secrets", "mountPath": "/var/run/secrets/nais.io/vault" }]
                }]),
                json!([token_volume(), { "name": "vault-secrets", "emptyDir": { "medium": "Memory" } }]),
            ),
        );

        let patch = patch_of(&response).expect("pod must be patched");
        let paths: Vec<&str> = patch.iter().filter_map(|op| op["path"].as_str()).collect();
        assert_eq!(paths, [
            "/spec/initContainers",
            "/spec/imagePullSecrets",
            "/metadata/annotations/mutatingflow.nais.io~1status",
        ]);
    }

    #[rstest]
    #[case::labelled(json!({ "pipelines.kubeflow.org/step": "train" }), true)]
    #[case::annotated_only(json!({}), false)]
    fn label_marker_selects_labelled_pods(
        catalog: InjectionCatalog,
        #[case] labels: Value,
        #[case] patched: bool,
    ) {
        let mut object = pod(
            step_annotations(),
            json!([{ "name": "main" }]),
            json!([token_volume()]),
        );
        object["metadata"]["labels"] = labels;

        let response = mutate_marked(
            &catalog,
            Marker::Label("pipelines.kubeflow.org/step".to_owned()),
            object,
        );

        assert!(response.allowed);
        assert_eq!(patch_of(&response).is_some(), patched);
    }
}
