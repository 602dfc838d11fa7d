//! Tracing configuration module for structured logging and observability
//!
//! Applications configure subscribers; the library only emits events and
//! spans. The subscriber setup is available with the `cli` feature, the span
//! and event helpers are always available.

#[cfg(feature = "cli")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Configuration for tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable console output with colors (default for CLI)
    Console,
    /// Compact console output without colors, for CI environments
    Compact,
    /// JSON structured logging
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Tracing configuration builder
#[derive(Debug)]
pub struct TracingConfig {
    /// Verbosity level (maps to log levels)
    pub verbosity: u8,
    /// Output format
    pub format: TracingFormat,
    /// Environment filter string (overrides verbosity if set)
    pub env_filter: Option<String>,
    /// Session ID for correlation
    pub session_id: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Console,
            env_filter: None,
            session_id: None,
        }
    }
}

impl TracingConfig {
    /// Create a new tracing configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity level (0-2+)
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set output format
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Set custom environment filter
    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Set session ID for correlation across submissions
    #[must_use]
    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Convert verbosity level to tracing filter string
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Initialize the global tracing subscriber
    ///
    /// # Errors
    /// - Filter string cannot be parsed
    /// - A global subscriber is already installed
    #[cfg(feature = "cli")]
    pub fn init(self) -> anyhow::Result<()> {
        use tracing_subscriber::fmt;

        let filter = match &self.env_filter {
            Some(env_filter) => EnvFilter::try_new(env_filter)?,
            None => EnvFilter::try_new(self.verbosity_to_filter())?,
        };
        let registry = Registry::default().with(filter);

        match self.format {
            TracingFormat::Console => {
                let fmt_layer = fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },
            TracingFormat::Compact => {
                let fmt_layer = fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => {
                let fmt_layer = fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr);
                registry.with(fmt_layer).try_init()?;
            },
        }

        if let Some(session_id) = &self.session_id {
            tracing::debug!(session_id = %session_id, "bg-reveal session started");
        }

        Ok(())
    }
}

/// Initialize tracing with CLI-friendly defaults
///
/// # Errors
/// - A global subscriber is already installed
#[cfg(feature = "cli")]
pub fn init_cli_tracing(verbosity: u8) -> anyhow::Result<()> {
    TracingConfig::new()
        .with_verbosity(verbosity)
        .with_format(TracingFormat::Console)
        .with_session_id(uuid::Uuid::new_v4().to_string())
        .init()
}

/// Span creation helpers for pipeline operations
pub mod spans {
    use crate::session::SubmissionId;
    use tracing::{Level, Span};

    /// Span covering one submission from upload to terminal status
    pub fn submission(submission: SubmissionId, file_name: &str, backend: &str) -> Span {
        tracing::span!(
            Level::INFO,
            "submission",
            submission = submission.get(),
            file_name = %file_name,
            backend = %backend
        )
    }

    /// Span covering the remote request and response read
    pub fn remote_call(backend: &str, bytes: usize) -> Span {
        tracing::span!(Level::DEBUG, "remote_call", backend = %backend, bytes = bytes)
    }

    /// Span covering the rendering of a before/after composite
    pub fn reveal_export(dimensions: (u32, u32), split_percent: f64) -> Span {
        tracing::span!(
            Level::DEBUG,
            "reveal_export",
            width = dimensions.0,
            height = dimensions.1,
            split_percent = split_percent
        )
    }
}

/// Event helpers for common logging patterns
pub mod events {
    use crate::session::{Status, SubmissionId};
    use tracing::{debug, error, trace};

    /// Log a progress change of a submission
    pub fn progress(submission: SubmissionId, status: Status, percent: u8) {
        trace!(submission = submission.get(), status = %status, percent, "progress");
    }

    /// Log an error with context
    pub fn error_with_context(error: &dyn std::error::Error, context: &str) {
        error!(error = %error, context = %context, "Operation failed");
    }

    /// Log that a locator was revoked
    pub fn handle_released(locator: &str, reason: &str) {
        debug!(locator = %locator, reason = %reason, "Released image handle");
    }
}
