//! A Kubernetes mutating admission webhook injecting Vault secrets, a CA bundle and proxy
//! configuration into Kubeflow notebooks and pipeline step pods.
//!
//! The [`router::Mutator`] inspects every admission request, decides via [`policy`] whether the
//! object needs mutating and answers with a JSON patch assembled by [`mutate`] from the
//! [`catalog::InjectionCatalog`].
pub mod catalog;
pub mod cli;
pub mod constants;
pub mod crd;
pub mod metrics;
pub mod mutate;
pub mod patch;
pub mod policy;
pub mod router;
