//! Logging setup.
//!
//! One `tracing` registry with an [`EnvFilter`] (`RUST_LOG` wins over the
//! configured level) and up to two output layers:
//!
//! - console, when `logging = true`
//! - daily-rotated files under `<cache_path>/logs`, keeping at most
//!   `file_logging_limit` files, when `file_logging = true`
//!
//! # Configuration-Based Initialization
//!
//! ```rust,ignore
//! let config = ConfigLoader::new().load()?;
//! nestgram_runtime::logging::init_from_config(&config);
//! ```
//!
//! # Manual Initialization
//!
//! ```rust,ignore
//! use nestgram_runtime::logging::{LoggingBuilder, SpanEvents};
//!
//! LoggingBuilder::new()
//!     .directive("nestgram_framework=debug")
//!     .span_events(SpanEvents::LIFECYCLE)
//!     .init();
//! ```

use std::path::PathBuf;

use thiserror::Error;
use tracing::{Subscriber, debug};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, NestGramConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The rotating file appender could not be created.
    #[error("failed to create log file appender: {0}")]
    Appender(String),

    /// A global subscriber is already installed.
    #[error(transparent)]
    Init(#[from] TryInitError),
}

/// Span event configuration for logging.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanEvents {
    /// Log when a span is created.
    pub new: bool,
    /// Log when a span is closed.
    pub close: bool,
}

impl SpanEvents {
    /// No span events will be logged.
    pub const NONE: Self = Self {
        new: false,
        close: false,
    };

    /// Log span creation and close events, e.g. the start and end of every
    /// `dispatch` span.
    pub const LIFECYCLE: Self = Self {
        new: true,
        close: true,
    };

    fn to_fmt_span(self) -> fmt::format::FmtSpan {
        let mut span = fmt::format::FmtSpan::NONE;
        if self.new {
            span |= fmt::format::FmtSpan::NEW;
        }
        if self.close {
            span |= fmt::format::FmtSpan::CLOSE;
        }
        span
    }
}

// =============================================================================
// Configuration-Based Initialization
// =============================================================================

/// Initialize logging from the bot configuration.
///
/// Does nothing if a global subscriber is already installed.
pub fn init_from_config(config: &NestGramConfig) {
    if let Err(e) = LoggingBuilder::from_config(config).try_init() {
        debug!(error = %e, "Logging not initialized");
    }
}

// =============================================================================
// LoggingBuilder
// =============================================================================

/// A builder for configuring logging.
#[derive(Debug)]
pub struct LoggingBuilder {
    directives: Vec<String>,
    level: tracing::Level,
    span_events: SpanEvents,
    format: LogFormat,
    console: bool,
    with_target: bool,
    with_thread_ids: bool,
    log_dir: Option<PathBuf>,
    max_files: usize,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    /// Console logging at `info`, no file output.
    pub fn new() -> Self {
        Self {
            directives: Vec::new(),
            level: tracing::Level::INFO,
            span_events: SpanEvents::NONE,
            format: LogFormat::Compact,
            console: true,
            with_target: true,
            with_thread_ids: false,
            log_dir: None,
            max_files: 20,
        }
    }

    /// Create a LoggingBuilder from the bot configuration.
    pub fn from_config(config: &NestGramConfig) -> Self {
        let mut builder = Self::new()
            .with_level(config.log.level.to_tracing_level())
            .format(config.log.format)
            .console(config.logging);

        if config.file_logging {
            builder = builder
                .log_dir(config.log_dir())
                .max_files(config.file_logging_limit);
        }

        for (target, level) in &config.log.filters {
            builder = builder.directive(&format!("{}={}", target, level.as_str()));
        }

        builder
    }

    /// Set the base log level.
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }

    /// Add a filter directive such as `nestgram_transport=trace`.
    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_string());
        self
    }

    /// Configure span events.
    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    /// Set the output format.
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable the console layer.
    pub fn console(mut self, enabled: bool) -> Self {
        self.console = enabled;
        self
    }

    /// Include the target (module path) in log output.
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    /// Include thread IDs in log output.
    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.with_thread_ids = enabled;
        self
    }

    /// Write daily-rotated files into `dir`.
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Set maximum number of rotated files to keep.
    pub fn max_files(mut self, count: usize) -> Self {
        self.max_files = count;
        self
    }

    /// Build the filter from directives.
    fn build_filter(&self) -> EnvFilter {
        let base_filter = self.level.to_string().to_lowercase();

        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&base_filter));

        for directive in &self.directives {
            if let Ok(d) = directive.parse() {
                filter = filter.add_directive(d);
            }
        }

        filter
    }

    /// Formats events into `writer` according to the configured format.
    fn fmt_layer<W>(&self, writer: W, ansi: bool) -> BoxedLayer
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let span_events = self.span_events.to_fmt_span();

        macro_rules! configure_layer {
            ($layer:expr) => {
                $layer
                    .with_span_events(span_events)
                    .with_target(self.with_target)
                    .with_thread_ids(self.with_thread_ids)
                    .with_ansi(ansi)
                    .with_writer(writer)
                    .boxed()
            };
        }

        match self.format {
            LogFormat::Compact => configure_layer!(fmt::layer().compact()),
            LogFormat::Full => configure_layer!(fmt::layer()),
            LogFormat::Pretty => configure_layer!(fmt::layer().pretty()),
            #[cfg(feature = "json-log")]
            LogFormat::Json => fmt::layer()
                .json()
                .with_span_events(span_events)
                .with_writer(writer)
                .boxed(),
        }
    }

    /// Builds the subscriber without installing it.
    pub fn build(self) -> Result<impl Subscriber + Send + Sync + 'static, LoggingError> {
        let filter = self.build_filter();
        let mut layers: Vec<BoxedLayer> = Vec::new();

        if self.console {
            layers.push(self.fmt_layer(std::io::stdout, true));
        }

        if let Some(dir) = &self.log_dir {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("nestgram")
                .filename_suffix("log")
                .max_log_files(self.max_files.max(1))
                .build(dir)
                .map_err(|e| LoggingError::Appender(e.to_string()))?;
            layers.push(self.fmt_layer(appender, false));
        }

        Ok(tracing_subscriber::registry().with(layers).with(filter))
    }

    /// Initialize the logging system.
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Try to initialize the logging system, returning an error on failure.
    pub fn try_init(self) -> Result<(), LoggingError> {
        self.build()?.try_init()?;
        Ok(())
    }
}
