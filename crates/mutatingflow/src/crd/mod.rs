//! Custom resources the webhook mutates, in addition to the built-in [`Pod`][1].
//!
//! [1]: k8s_openapi::api::core::v1::Pod
mod notebook;

pub use notebook::*;
