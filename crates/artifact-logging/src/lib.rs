//! JSONL and console logging for artifacts
//!
//! Every artifact crate logs through `tracing`. This crate installs the
//! subscriber: JSONL (default) or human-readable console output, optional
//! rolling JSONL files, and an `EnvFilter` that `RUST_LOG` overrides.
//!
//! # Quick Start
//!
//! ```ignore
//! use artifact_logging::{ArtifactSubscriberBuilder, LogConfig};
//!
//! // Simple setup with defaults (JSONL to console)
//! ArtifactSubscriberBuilder::new().init();
//!
//! // Development mode with pretty human-readable output
//! ArtifactSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//!
//! // Keep the guard alive while logging to files
//! let _guard = ArtifactSubscriberBuilder::new()
//!     .with_config(LogConfig::production("./logs".into()))
//!     .try_init()?;
//!
//! // One file per artifact, named after it
//! let _guard = ArtifactSubscriberBuilder::new()
//!     .with_config(LogConfig::per_artifact("./logs", "echo@example.org"))
//!     .try_init()?;
//! ```

pub mod config;

pub use config::{
    ConsoleConfig, DISPATCH_TARGET, FileConfig, JsonlConfig, LogConfig, RotationStrategy,
    TRANSPORT_TARGET,
};
pub use tracing_appender::non_blocking::WorkerGuard;

use std::fs::{self, File};

use thiserror::Error;
use tracing::Subscriber;
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::{
    self,
    format::{Format, Json, JsonFields},
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid filter directive: {0}")]
    Filter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to create log appender: {0}")]
    Appender(String),

    #[error("Global subscriber already set: {0}")]
    AlreadyInitialized(String),
}

/// Result type alias for logging setup
pub type LoggingResult<T> = Result<T, LoggingError>;

/// Builder for configuring and initializing the logging subscriber
///
/// By default, console output uses JSONL format. Use `LogConfig::development()`
/// for human-readable output during development.
pub struct ArtifactSubscriberBuilder {
    config: LogConfig,
}

impl ArtifactSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    ///
    /// Default: JSONL output to console
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Set the level for a single target
    pub fn with_target(mut self, target: impl Into<String>, level: impl Into<String>) -> Self {
        self.config = self.config.with_target(target, level);
        self
    }

    /// Initialize the subscriber globally
    ///
    /// Returns a guard that must be kept alive for the duration of the
    /// program when file output is enabled.
    ///
    /// # Panics
    ///
    /// Panics if a global subscriber has already been set or the
    /// configuration is invalid.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => panic!("Failed to initialize logging: {}", e),
        }
    }

    /// Try to initialize the subscriber globally
    pub fn try_init(self) -> LoggingResult<Option<WorkerGuard>> {
        let env_filter = self.env_filter()?;
        let console = &self.config.console;
        let jsonl = &self.config.jsonl;

        let pretty_console = (console.enabled && console.pretty)
            .then(|| fmt::layer().with_ansi(console.ansi).with_target(true));
        let json_console = (console.enabled && !console.pretty).then(|| json_layer(jsonl));

        let (file_layer, guard) = match &self.config.file {
            Some(file_config) => {
                let (writer, guard) = file_writer(file_config)?;
                (Some(json_layer(jsonl).with_writer(writer)), Some(guard))
            }
            None => (None, None),
        };

        Registry::default()
            .with(env_filter)
            .with(pretty_console)
            .with(json_console)
            .with(file_layer)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

        Ok(guard)
    }

    /// `RUST_LOG` when set, else the configured level and target directives
    fn env_filter(&self) -> LoggingResult<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }

        let mut filter = EnvFilter::try_new(&self.config.level)
            .map_err(|e| LoggingError::Filter(format!("{}: {}", self.config.level, e)))?;
        for (target, level) in &self.config.targets {
            let spec = format!("{}={}", target, level);
            let directive: Directive = spec
                .parse()
                .map_err(|e| LoggingError::Filter(format!("{}: {}", spec, e)))?;
            filter = filter.add_directive(directive);
        }
        Ok(filter)
    }
}

impl Default for ArtifactSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// JSONL formatting layer shared by console and file output
fn json_layer<S>(config: &JsonlConfig) -> fmt::Layer<S, JsonFields, Format<Json>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .json()
        .with_current_span(config.include_current_span)
        .with_span_list(config.include_spans)
        .flatten_event(config.flatten_events)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_thread_ids(config.include_thread_info)
        .with_thread_names(config.include_thread_info)
}

/// Non-blocking file writer; truncates for `Never`, appends otherwise
fn file_writer(config: &FileConfig) -> LoggingResult<(NonBlocking, WorkerGuard)> {
    fs::create_dir_all(&config.directory)?;

    let rotation = match config.rotation {
        RotationStrategy::Never => {
            let path = config.directory.join(format!("{}.log", config.prefix));
            let file = File::create(path)?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(config.prefix.as_str())
        .filename_suffix("log");
    if let Some(max_files) = config.max_files {
        builder = builder.max_log_files(max_files);
    }
    let appender = builder
        .build(&config.directory)
        .map_err(|e| LoggingError::Appender(e.to_string()))?;

    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize logging with default settings (JSONL to console)
pub fn init_default() {
    ArtifactSubscriberBuilder::new().init();
}

/// Initialize logging for development (verbose, pretty console output)
pub fn init_development() {
    ArtifactSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init();
}

/// Initialize logging for testing (minimal output)
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_testing() {
    let _ = ArtifactSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}
