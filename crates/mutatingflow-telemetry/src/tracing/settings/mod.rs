//! Subscriber settings.
use tracing::level_filters::LevelFilter;

mod console_log;
mod file_log;
mod otlp;

pub use console_log::*;
pub use file_log::*;
pub use otlp::*;

/// General settings that apply to any subscriber.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// The environment variable used to set the [`LevelFilter`].
    ///
    /// When the environment variable is set, it overrides [`Self::default_level`].
    pub environment_variable: &'static str,

    /// The [`LevelFilter`] to fall back to if [`Self::environment_variable`] is not set.
    pub default_level: LevelFilter,
}

impl Settings {
    pub fn new(environment_variable: &'static str, default_level: impl Into<LevelFilter>) -> Self {
        Self {
            environment_variable,
            default_level: default_level.into(),
        }
    }
}

/// Implemented by the settings of every subscriber which can be switched off.
pub trait SettingsToggle {
    fn is_enabled(&self) -> bool;

    fn is_disabled(&self) -> bool {
        !self.is_enabled()
    }
}
