//! Dispatches admission requests to the builder of the requested kind.
use k8s_openapi::api::core::v1::Pod;
use kube::core::{
    DynamicObject,
    admission::{AdmissionRequest, AdmissionResponse},
};
use snafu::{OptionExt, Report, Snafu};
use tracing::{debug, info, warn};

use crate::{
    catalog::InjectionCatalog,
    crd::Notebook,
    metrics::{AdmissionMetrics, Outcome},
    mutate::{self, MutationContext, MutationProfile},
    policy::Marker,
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("unknown object kind {kind:?}"))]
    UnknownKind { kind: String },

    #[snafu(display("neither the request nor the object specify a namespace"))]
    MissingNamespace,
}

type Builder = fn(
    &MutationProfile,
    &AdmissionRequest<DynamicObject>,
    &DynamicObject,
    MutationContext<'_>,
) -> AdmissionResponse;

/// Everything needed to mutate admission requests. Immutable once built and shared between all
/// requests.
#[derive(Clone, Debug)]
pub struct Mutator {
    catalog: InjectionCatalog,
    teams: Vec<String>,
    notebook: MutationProfile,
    pipeline_pod: MutationProfile,
    metrics: AdmissionMetrics,
}

impl Mutator {
    /// Creates a new mutator.
    ///
    /// Only namespaces listed in `teams` are mutated, an empty list serves all namespaces.
    /// Pipeline pods are recognized by the `pipeline_marker`. Every answered request is counted
    /// in `metrics`.
    pub fn new(
        catalog: InjectionCatalog,
        teams: Vec<String>,
        pipeline_marker: Marker,
        metrics: AdmissionMetrics,
    ) -> Self {
        Self {
            catalog,
            teams,
            notebook: MutationProfile::notebook(),
            pipeline_pod: MutationProfile::pipeline_pod(pipeline_marker),
            metrics,
        }
    }

    /// The namespaces served, empty if all namespaces are served.
    pub fn teams(&self) -> &[String] {
        &self.teams
    }

    /// Returns the response to `request`. This never fails, errors deny the request.
    pub fn route(&self, request: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        let response = self.respond(request);
        self.metrics.record(&request.kind.kind, Outcome::of(&response));
        response
    }

    fn respond(&self, request: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        let kind = request.kind.kind.as_str();
        info!(
            admission.uid = request.uid.as_str(),
            admission.operation = ?request.operation,
            admission.user = request.user_info.username.as_deref(),
            k8s.kind = kind,
            k8s.namespace = request.namespace.as_deref(),
            k8s.name = request.name.as_str(),
            "handling admission request"
        );

        let (profile, build) = match kind {
            "Notebook" => (&self.notebook, mutate::build::<Notebook> as Builder),
            "Pod" => (&self.pipeline_pod, mutate::build::<Pod> as Builder),
            _ => return deny(request, UnknownKindSnafu { kind }.build()),
        };

        let Some(object) = &request.object else {
            debug!(k8s.kind = kind, "request carries no object, nothing to mutate");
            return AdmissionResponse::from(request);
        };

        let namespace = match request
            .namespace
            .as_deref()
            .or(object.metadata.namespace.as_deref())
            .context(MissingNamespaceSnafu)
        {
            Ok(namespace) => namespace,
            Err(err) => return deny(request, err),
        };

        if !self.serves(namespace) {
            debug!(k8s.namespace = namespace, "namespace is not served");
            return AdmissionResponse::from(request);
        }

        let context = MutationContext {
            team: namespace,
            catalog: &self.catalog,
        };

        build(profile, request, object, context)
    }

    fn serves(&self, namespace: &str) -> bool {
        self.teams.is_empty() || self.teams.iter().any(|team| team == namespace)
    }
}

fn deny(request: &AdmissionRequest<DynamicObject>, err: Error) -> AdmissionResponse {
    let message = Report::from_error(err).to_string();
    warn!(
        admission.uid = request.uid.as_str(),
        error = message.as_str(),
        "denying admission request"
    );
    AdmissionResponse::from(request).deny(message)
}
