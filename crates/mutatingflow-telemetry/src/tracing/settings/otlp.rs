//! OTLP Subscriber Settings, used for both the log and the trace exporter.
//!
//! The exporters themselves are configured through the `OTEL_*` environment variables read by
//! the opentelemetry crates.
use super::{Settings, SettingsToggle};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OtlpSettings {
    #[default]
    Disabled,

    Enabled {
        /// Common subscriber settings that apply to the OTLP exporter.
        common_settings: Settings,
    },
}

impl SettingsToggle for OtlpSettings {
    fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled { .. })
    }
}

impl From<Settings> for OtlpSettings {
    fn from(common_settings: Settings) -> Self {
        Self::Enabled { common_settings }
    }
}

/// Enables the exporter with the given environment variable and default level if the flag is set.
impl<L> From<(&'static str, L, bool)> for OtlpSettings
where
    L: Into<tracing::level_filters::LevelFilter>,
{
    fn from((environment_variable, default_level, enabled): (&'static str, L, bool)) -> Self {
        if enabled {
            Settings::new(environment_variable, default_level).into()
        } else {
            Self::Disabled
        }
    }
}
