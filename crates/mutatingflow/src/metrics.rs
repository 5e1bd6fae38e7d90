//! Prometheus counters of the handled admission requests.
use std::fmt;

use kube::core::admission::AdmissionResponse;
use prometheus::{IntCounterVec, Opts, Registry};
use snafu::{ResultExt, Snafu};
use strum::IntoStaticStr;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to register metric {name:?}"))]
    RegisterMetric {
        source: prometheus::Error,
        name: &'static str,
    },
}

const ADMISSIONS_TOTAL: &str = "mutatingflow_admissions_total";

/// How an admission request was answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Outcome {
    /// Allowed with a patch.
    Mutated,

    /// Allowed without a patch.
    Skipped,

    Denied,
}

impl Outcome {
    pub fn of(response: &AdmissionResponse) -> Self {
        match (response.allowed, &response.patch) {
            (false, _) => Self::Denied,
            (true, Some(_)) => Self::Mutated,
            (true, None) => Self::Skipped,
        }
    }
}

/// The admission counters, labelled by object kind and [`Outcome`].
#[derive(Clone)]
pub struct AdmissionMetrics {
    admissions: IntCounterVec,
}

impl fmt::Debug for AdmissionMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionMetrics").finish_non_exhaustive()
    }
}

impl AdmissionMetrics {
    /// Creates the counters and registers them in `registry`.
    pub fn new(registry: &Registry) -> Result<Self, Error> {
        let admissions = IntCounterVec::new(
            Opts::new(ADMISSIONS_TOTAL, "Admission requests by object kind and outcome"),
            &["kind", "outcome"],
        )
        .context(RegisterMetricSnafu {
            name: ADMISSIONS_TOTAL,
        })?;
        registry
            .register(Box::new(admissions.clone()))
            .context(RegisterMetricSnafu {
                name: ADMISSIONS_TOTAL,
            })?;

        Ok(Self { admissions })
    }

    pub fn record(&self, kind: &str, outcome: Outcome) {
        let outcome: &'static str = outcome.into();
        self.admissions.with_label_values(&[kind, outcome]).inc();
    }

    pub fn count(&self, kind: &str, outcome: Outcome) -> u64 {
        let outcome: &'static str = outcome.into();
        self.admissions.with_label_values(&[kind, outcome]).get()
    }
}

#[cfg(test)]
mod tests {
    use prometheus::TextEncoder;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::denied(false, None, Outcome::Denied)]
    #[case::mutated(true, Some(b"[]".to_vec()), Outcome::Mutated)]
    #[case::skipped(true, None, Outcome::Skipped)]
    fn outcome_of_response(
        #[case] allowed: bool,
        #[case] patch: Option<Vec<u8>>,
        #[case] expected: Outcome,
    ) {
        let mut response = AdmissionResponse::invalid("test");
        response.allowed = allowed;
        response.patch = patch;

        assert_eq!(Outcome::of(&response), expected);
    }

    #[test]
    fn counters_are_exported() {
        let registry = Registry::new();
        let metrics = AdmissionMetrics::new(&registry).expect("metrics must register");

        metrics.record("Pod", Outcome::Mutated);
        metrics.record("Pod", Outcome::Mutated);
        metrics.record("Notebook", Outcome::Denied);

        assert_eq!(metrics.count("Pod", Outcome::Mutated), 2);
        assert_eq!(metrics.count("Pod", Outcome::Skipped), 0);

        let text = TextEncoder::new()
            .encode_to_string(&registry.gather())
            .expect("metrics must encode");
        assert!(text.contains(r#"mutatingflow_admissions_total{kind="Pod",outcome="mutated"} 2"#));
        assert!(
            text.contains(r#"mutatingflow_admissions_total{kind="Notebook",outcome="denied"} 1"#)
        );
    }

    #[test]
    fn registering_twice_fails() {
        let registry = Registry::new();
        AdmissionMetrics::new(&registry).expect("metrics must register");

        assert!(AdmissionMetrics::new(&registry).is_err());
    }
}
