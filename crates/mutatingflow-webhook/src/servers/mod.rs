//! Contains ready-to-use webhooks which can be registered on the [`WebhookServer`][1] router.
//!
//! [1]: crate::WebhookServer
mod health;
mod mutating;

pub use health::*;
pub use mutating::*;
