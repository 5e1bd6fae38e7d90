//! Tracing, logging and OpenTelemetry primitives used by mutatingflow.
//!
//! To get started, see [`Tracing`].
pub mod tracing;

pub use crate::tracing::{TelemetryOptions, Tracing};
