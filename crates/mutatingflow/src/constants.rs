//! Contains well-known annotation keys, names and paths shared by the policy gate, the catalog
//! and the patch builders.

/// The annotation marking an object as already mutated.
pub const STATUS_ANNOTATION_KEY: &str = "mutatingflow.nais.io/status";

/// The value of [`STATUS_ANNOTATION_KEY`] once the object has been mutated. Compared
/// case-insensitively.
pub const STATUS_INJECTED: &str = "injected";

/// The annotation Argo sets on every workflow step pod. Its presence marks a pod as a pipeline
/// step.
pub const DEFAULT_PIPELINE_MARKER_ANNOTATION: &str = "workflows.argoproj.io/node-name";

/// Name of the workload container in pipeline step pods. Other containers (`wait`, ...) are
/// auxiliary and never mutated.
pub const PIPELINE_MAIN_CONTAINER_NAME: &str = "main";

/// Prefix of the service account token volume the pipeline runner pods get.
pub const PIPELINE_TOKEN_VOLUME_PREFIX: &str = "pipeline-runner-token";

/// Where Kubernetes mounts the service account token into containers.
pub const SERVICE_ACCOUNT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount";
