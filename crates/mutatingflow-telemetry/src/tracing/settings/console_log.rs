//! Console Log Subscriber Settings.
use super::{Settings, SettingsToggle};

/// Configure specific settings for the Console Log subscriber.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ConsoleLogSettings {
    #[default]
    Disabled,

    Enabled {
        /// Common subscriber settings that apply to the Console Log Subscriber.
        common_settings: Settings,

        /// Console Subscriber log event output format.
        log_format: LogFormat,
    },
}

impl SettingsToggle for ConsoleLogSettings {
    fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled { .. })
    }
}

/// Console Subscriber log event output formats.
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines. ANSI colors can be disabled by setting `NO_COLOR`.
    #[default]
    Text,

    /// One JSON object per event, as expected by log collectors.
    Json,
}
