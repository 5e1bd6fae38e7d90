//! File Log Subscriber Settings.
use std::path::PathBuf;

/// Re-export to save the end crate an explicit dependency on `tracing_appender`.
pub use tracing_appender::rolling::Rotation;

use super::{Settings, SettingsToggle};

/// Configure specific settings for the File Log subscriber. Files are always written as JSON.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FileLogSettings {
    #[default]
    Disabled,

    Enabled {
        /// Common subscriber settings that apply to the File Log Subscriber.
        common_settings: Settings,

        /// Path to directory for log files.
        file_log_dir: PathBuf,

        /// Log rotation frequency.
        rotation_period: Rotation,

        /// Suffix of the log file names, the prefix is the service name.
        filename_suffix: String,

        /// Keep at most this many log files.
        max_log_files: Option<usize>,
    },
}

impl SettingsToggle for FileLogSettings {
    fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled { .. })
    }
}

impl<T> From<Option<T>> for FileLogSettings
where
    T: Into<Self>,
{
    fn from(settings: Option<T>) -> Self {
        settings.map_or_else(Self::default, Into::into)
    }
}
