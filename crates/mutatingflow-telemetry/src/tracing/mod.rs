//! Initialises the tracing subscribers for console output, file output and OpenTelemetry OTLP
//! export of traces and logs.
//!
//! To get started, see [`Tracing`].
use std::path::PathBuf;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{ExporterBuildError, LogExporter, SpanExporter};
use opentelemetry_sdk::{
    Resource, logs::SdkLoggerProvider, propagation::TraceContextPropagator,
    trace::SdkTracerProvider,
};
use snafu::{ResultExt as _, Snafu};
use tracing::{level_filters::LevelFilter, subscriber::SetGlobalDefaultError};
use tracing_appender::rolling::{InitError, RollingFileAppender};
use tracing_subscriber::{EnvFilter, Layer, Registry, filter::Directive, layer::SubscriberExt};

use crate::tracing::settings::*;

pub mod settings;

type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors which can be encountered when initialising [`Tracing`].
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("unable to install opentelemetry trace exporter"))]
    InstallOtelTraceExporter { source: ExporterBuildError },

    #[snafu(display("unable to install opentelemetry log exporter"))]
    InstallOtelLogExporter { source: ExporterBuildError },

    #[snafu(display("failed to initialize rolling file appender"))]
    InitRollingFileAppender { source: InitError },

    #[snafu(display("unable to set the global default subscriber"))]
    SetGlobalDefaultSubscriber { source: SetGlobalDefaultError },
}

/// A set of tracing subscriber layers, active while the value returned by [`Tracing::init`] is
/// kept alive.
///
/// Dropping the guard shuts down the OTLP providers, flushing pending exports. Bind it to a named
/// variable, `let _ = ...` drops it immediately.
///
/// ```
/// # use mutatingflow_telemetry::{Tracing, TelemetryOptions};
/// # fn main() -> Result<(), mutatingflow_telemetry::tracing::Error> {
/// let _tracing_guard = Tracing::pre_configured("mutatingflow", TelemetryOptions::default()).init()?;
/// tracing::info!("log a message");
/// # Ok(())
/// # }
/// ```
///
/// # Environment variables
///
/// The level of every subscriber can be overridden with an [`EnvFilter`] directive:
///
/// | Subscriber   | Variable                      |
/// | ------------ | ----------------------------- |
/// | Console logs | [`Tracing::CONSOLE_LOG_LEVEL`] |
/// | File logs    | [`Tracing::FILE_LOG_LEVEL`]    |
/// | OTLP logs    | [`Tracing::OTEL_LOG_EXPORTER_LEVEL`] |
/// | OTLP traces  | [`Tracing::OTEL_TRACE_EXPORTER_LEVEL`] |
///
/// The OTLP exporters read the usual `OTEL_EXPORTER_OTLP_*` variables.
pub struct Tracing {
    service_name: &'static str,
    console_log_settings: ConsoleLogSettings,
    file_log_settings: FileLogSettings,
    otlp_log_settings: OtlpSettings,
    otlp_trace_settings: OtlpSettings,

    logger_provider: Option<SdkLoggerProvider>,
    tracer_provider: Option<SdkTracerProvider>,
}

impl Tracing {
    /// The environment variable used to set the console log level filter.
    pub const CONSOLE_LOG_LEVEL: &str = "CONSOLE_LOG_LEVEL";
    /// The environment variable used to set the rolling file log level filter.
    pub const FILE_LOG_LEVEL: &str = "FILE_LOG_LEVEL";
    /// The filename suffix used for the rolling file logs.
    pub const FILE_LOG_SUFFIX: &str = "tracing-rs.json";
    /// The environment variable used to set the OTEL log level filter.
    pub const OTEL_LOG_EXPORTER_LEVEL: &str = "OTEL_LOG_EXPORTER_LEVEL";
    /// The environment variable used to set the OTEL trace level filter.
    pub const OTEL_TRACE_EXPORTER_LEVEL: &str = "OTEL_TRACE_EXPORTER_LEVEL";

    /// Creates a [`TracingBuilder`] with every subscriber disabled.
    pub fn builder(service_name: &'static str) -> TracingBuilder {
        TracingBuilder {
            service_name,
            console_log_settings: ConsoleLogSettings::default(),
            file_log_settings: FileLogSettings::default(),
            otlp_log_settings: OtlpSettings::default(),
            otlp_trace_settings: OtlpSettings::default(),
        }
    }

    /// Creates a [`Tracing`] instance configured from command line `options`.
    ///
    /// The console uses the level and format from `options`, every other enabled subscriber
    /// defaults to INFO. Log files are rotated according to
    /// [`TelemetryOptions::file_log_rotation_period`], which defaults to
    /// [`RotationPeriod::Never`].
    pub fn pre_configured(service_name: &'static str, options: TelemetryOptions) -> Self {
        let TelemetryOptions {
            log_level,
            log_format,
            console_log_disabled,
            file_log_directory,
            file_log_rotation_period,
            file_log_max_files,
            otel_trace_exporter_enabled,
            otel_log_exporter_enabled,
        } = options;

        let console_log_settings = if console_log_disabled {
            ConsoleLogSettings::Disabled
        } else {
            ConsoleLogSettings::Enabled {
                common_settings: Settings::new(Self::CONSOLE_LOG_LEVEL, log_level),
                log_format,
            }
        };

        let file_log_settings = file_log_directory.map(|file_log_dir| FileLogSettings::Enabled {
            common_settings: Settings::new(Self::FILE_LOG_LEVEL, LevelFilter::INFO),
            file_log_dir,
            rotation_period: file_log_rotation_period.unwrap_or_default().into(),
            filename_suffix: Self::FILE_LOG_SUFFIX.to_owned(),
            max_log_files: file_log_max_files,
        });

        Self::builder(service_name)
            .with_console_output(console_log_settings)
            .with_file_output(file_log_settings)
            .with_otlp_log_exporter((
                Self::OTEL_LOG_EXPORTER_LEVEL,
                LevelFilter::INFO,
                otel_log_exporter_enabled,
            ))
            .with_otlp_trace_exporter((
                Self::OTEL_TRACE_EXPORTER_LEVEL,
                LevelFilter::INFO,
                otel_trace_exporter_enabled,
            ))
            .build()
    }

    /// Initialises the configured subscribers, returning a guard which shuts them down when
    /// dropped.
    pub fn init(mut self) -> Result<Self> {
        let mut layers: Vec<Box<dyn Layer<Registry> + Sync + Send>> = Vec::new();

        if let ConsoleLogSettings::Enabled {
            common_settings,
            log_format,
        } = &self.console_log_settings
        {
            let env_filter_layer = env_filter_builder(
                common_settings.environment_variable,
                common_settings.default_level,
            );

            let console_output_layer = match log_format {
                LogFormat::Text => tracing_subscriber::fmt::layer()
                    .with_filter(env_filter_layer)
                    .boxed(),
                LogFormat::Json => tracing_subscriber::fmt::layer()
                    .json()
                    .with_filter(env_filter_layer)
                    .boxed(),
            };
            layers.push(console_output_layer);
        }

        if let FileLogSettings::Enabled {
            common_settings,
            file_log_dir,
            rotation_period,
            filename_suffix,
            max_log_files,
        } = &self.file_log_settings
        {
            let env_filter_layer = env_filter_builder(
                common_settings.environment_variable,
                common_settings.default_level,
            );

            let file_appender = RollingFileAppender::builder()
                .rotation(rotation_period.clone())
                .filename_prefix(self.service_name)
                .filename_suffix(filename_suffix);

            let file_appender = match max_log_files {
                Some(max_log_files) => file_appender.max_log_files(*max_log_files),
                None => file_appender,
            };

            let file_appender = file_appender
                .build(file_log_dir)
                .context(InitRollingFileAppenderSnafu)?;

            layers.push(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(file_appender)
                    .with_filter(env_filter_layer)
                    .boxed(),
            );
        }

        if let OtlpSettings::Enabled { common_settings } = &self.otlp_log_settings {
            let env_filter_layer = otlp_env_filter(common_settings);

            let log_exporter = LogExporter::builder()
                .with_tonic()
                .build()
                .context(InstallOtelLogExporterSnafu)?;

            let logger_provider = SdkLoggerProvider::builder()
                .with_batch_exporter(log_exporter)
                .with_resource(self.resource())
                .build();

            // Convert `tracing::Event` to OpenTelemetry logs
            layers.push(
                OpenTelemetryTracingBridge::new(&logger_provider)
                    .with_filter(env_filter_layer)
                    .boxed(),
            );
            self.logger_provider = Some(logger_provider);
        }

        if let OtlpSettings::Enabled { common_settings } = &self.otlp_trace_settings {
            let env_filter_layer = otlp_env_filter(common_settings);

            let trace_exporter = SpanExporter::builder()
                .with_tonic()
                .build()
                .context(InstallOtelTraceExporterSnafu)?;

            let tracer_provider = SdkTracerProvider::builder()
                .with_batch_exporter(trace_exporter)
                .with_resource(self.resource())
                .build();

            let tracer = tracer_provider.tracer(self.service_name);

            layers.push(
                tracing_opentelemetry::layer()
                    .with_tracer(tracer)
                    .with_filter(env_filter_layer)
                    .boxed(),
            );
            self.tracer_provider = Some(tracer_provider);

            // Propagate the trace context through the W3C `traceparent` header
            opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());
        }

        if !layers.is_empty() {
            tracing::subscriber::set_global_default(tracing_subscriber::registry().with(layers))
                .context(SetGlobalDefaultSubscriberSnafu)?;
        }

        // Returning self keeps the providers alive, dropping it here would shut them down
        Ok(self)
    }

    fn resource(&self) -> Resource {
        Resource::builder()
            .with_service_name(self.service_name)
            .build()
    }
}

impl Drop for Tracing {
    fn drop(&mut self) {
        tracing::debug!(
            opentelemetry.tracing.enabled = self.otlp_trace_settings.is_enabled(),
            opentelemetry.logger.enabled = self.otlp_log_settings.is_enabled(),
            "shutting down opentelemetry OTLP providers"
        );

        if let Some(tracer_provider) = &self.tracer_provider
            && let Err(error) = tracer_provider.shutdown()
        {
            tracing::error!(%error, "unable to shutdown TracerProvider");
        }

        if let Some(logger_provider) = &self.logger_provider
            && let Err(error) = logger_provider.shutdown()
        {
            tracing::error!(%error, "unable to shutdown LoggerProvider");
        }
    }
}

/// Builds a [`Tracing`] instance.
#[derive(Debug)]
pub struct TracingBuilder {
    service_name: &'static str,
    console_log_settings: ConsoleLogSettings,
    file_log_settings: FileLogSettings,
    otlp_log_settings: OtlpSettings,
    otlp_trace_settings: OtlpSettings,
}

impl TracingBuilder {
    pub fn with_console_output(mut self, settings: impl Into<ConsoleLogSettings>) -> Self {
        self.console_log_settings = settings.into();
        self
    }

    pub fn with_file_output(mut self, settings: impl Into<FileLogSettings>) -> Self {
        self.file_log_settings = settings.into();
        self
    }

    pub fn with_otlp_log_exporter(mut self, settings: impl Into<OtlpSettings>) -> Self {
        self.otlp_log_settings = settings.into();
        self
    }

    pub fn with_otlp_trace_exporter(mut self, settings: impl Into<OtlpSettings>) -> Self {
        self.otlp_trace_settings = settings.into();
        self
    }

    pub fn build(self) -> Tracing {
        Tracing {
            service_name: self.service_name,
            console_log_settings: self.console_log_settings,
            file_log_settings: self.file_log_settings,
            otlp_log_settings: self.otlp_log_settings,
            otlp_trace_settings: self.otlp_trace_settings,
            logger_provider: None,
            tracer_provider: None,
        }
    }
}

/// Creates an [`EnvFilter`] configured with the given environment variable and default [`Directive`].
fn env_filter_builder(env_var: &str, default_directive: impl Into<Directive>) -> EnvFilter {
    EnvFilter::builder()
        .with_env_var(env_var)
        .with_default_directive(default_directive.into())
        .from_env_lossy()
}

/// The exporters' own gRPC client must not feed back into them.
fn otlp_env_filter(common_settings: &Settings) -> EnvFilter {
    let filter = env_filter_builder(
        common_settings.environment_variable,
        common_settings.default_level,
    );

    ["h2=off", "tonic=off", "tower=off"]
        .into_iter()
        .filter_map(|directive| directive.parse().ok())
        .fold(filter, EnvFilter::add_directive)
}

/// Telemetry command line arguments, see [`Tracing::pre_configured`].
///
/// Can be flattened into a clap parser if the `clap` feature is enabled.
#[cfg_attr(feature = "clap", derive(clap::Args))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TelemetryOptions {
    /// Default level of the console logs. Overridden by CONSOLE_LOG_LEVEL.
    #[cfg_attr(feature = "clap", arg(long, env, default_value_t = LevelFilter::INFO))]
    pub log_level: LevelFilter,

    /// Format of the console logs.
    #[cfg_attr(feature = "clap", arg(long, env, value_enum, default_value_t))]
    pub log_format: LogFormat,

    /// Disable console logs.
    #[cfg_attr(feature = "clap", arg(long, env))]
    pub console_log_disabled: bool,

    /// Enable logging to files located in the specified DIRECTORY.
    #[cfg_attr(
        feature = "clap",
        arg(long, env, value_name = "DIRECTORY", group = "file_log")
    )]
    pub file_log_directory: Option<PathBuf>,

    /// Time PERIOD after which log files are rolled over.
    #[cfg_attr(
        feature = "clap",
        arg(long, env, value_name = "PERIOD", requires = "file_log")
    )]
    pub file_log_rotation_period: Option<RotationPeriod>,

    /// Maximum NUMBER of log files to keep.
    #[cfg_attr(
        feature = "clap",
        arg(long, env, value_name = "NUMBER", requires = "file_log")
    )]
    pub file_log_max_files: Option<usize>,

    /// Enable exporting OTEL traces via OTLP.
    #[cfg_attr(feature = "clap", arg(long, env))]
    pub otel_trace_exporter_enabled: bool,

    /// Enable exporting OTEL logs via OTLP.
    #[cfg_attr(feature = "clap", arg(long, env))]
    pub otel_log_exporter_enabled: bool,
}

impl Default for TelemetryOptions {
    fn default() -> Self {
        Self {
            log_level: LevelFilter::INFO,
            log_format: LogFormat::default(),
            console_log_disabled: false,
            file_log_directory: None,
            file_log_rotation_period: None,
            file_log_max_files: None,
            otel_trace_exporter_enabled: false,
            otel_log_exporter_enabled: false,
        }
    }
}

/// Supported periods when the log file is rolled over.
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "PascalCase")]
pub enum RotationPeriod {
    Minutely,
    Hourly,
    Daily,

    #[default]
    Never,
}

impl From<RotationPeriod> for Rotation {
    fn from(value: RotationPeriod) -> Self {
        match value {
            RotationPeriod::Minutely => Self::MINUTELY,
            RotationPeriod::Hourly => Self::HOURLY,
            RotationPeriod::Daily => Self::DAILY,
            RotationPeriod::Never => Self::NEVER,
        }
    }
}
