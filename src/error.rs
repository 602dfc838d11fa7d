//! Error types for the upload, processing and reveal pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, BgRevealError>;

/// Generic message shown for any failure without a more specific explanation
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to process image. Please try again.";

/// Remote message fragment that signals the service found no subject
pub const NO_FOREGROUND_MARKER: &str = "Could not identify foreground";

/// Guidance shown in place of [`NO_FOREGROUND_MARKER`] messages
pub const NO_FOREGROUND_GUIDANCE: &str =
    "Could not find a distinct subject in this image. Try a photo with a clear foreground subject.";

/// Rejection raised by the upload intake before anything reaches the network
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No file was supplied
    #[error("No file selected.")]
    MissingFile,

    /// File exceeds the configured upload limit
    #[error("File size too large. Max {} allowed.", format_limit(.limit))]
    TooLarge {
        /// Size of the rejected file in bytes
        size: u64,
        /// Configured limit in bytes
        limit: u64,
    },

    /// File type is not one the picker accepts
    #[error("Unsupported file type: {mime}. Use PNG, JPG or WEBP.")]
    UnsupportedType {
        /// Declared MIME type of the rejected file
        mime: String,
    },
}

/// Upload limit in the largest whole unit, e.g. `10MB`
#[allow(clippy::trivially_copy_pass_by_ref)]
fn format_limit(limit: &u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    match *limit {
        0 => "0 bytes".to_string(),
        l if l % MB == 0 => format!("{}MB", l / MB),
        l if l % KB == 0 => format!("{}KB", l / KB),
        l => format!("{l} bytes"),
    }
}

fn rejection_detail(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

impl ValidationError {
    /// Human-readable reason, suitable for inline display next to the upload control
    #[must_use]
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// Failure of a single processing submission
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessingError {
    /// The remote endpoint answered with a non-success status
    #[error("Remote service rejected the image (HTTP {status}){}", rejection_detail(.message))]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Message taken from the response body, if any
        message: Option<String>,
    },

    /// Network or transport fault before a complete response was read
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote endpoint reported success but returned no image data
    #[error("Remote service returned an empty result")]
    EmptyResult,

    /// A newer submission replaced this one; its result was discarded
    #[error("Submission was superseded by a newer one")]
    Superseded,
}

impl ProcessingError {
    /// Message presented to the user in the error banner
    ///
    /// Remote messages pass through verbatim except for the "no foreground"
    /// case, which is translated into guidance. Everything else collapses to
    /// [`GENERIC_FAILURE_MESSAGE`].
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected {
                message: Some(message),
                ..
            } => translate_remote_message(message),
            Self::Rejected { message: None, .. }
            | Self::Transport(_)
            | Self::EmptyResult
            | Self::Superseded => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

/// Translate a remote error message into the text shown to the user
#[must_use]
pub fn translate_remote_message(message: &str) -> String {
    if message.contains(NO_FOREGROUND_MARKER) {
        NO_FOREGROUND_GUIDANCE.to_string()
    } else if message.trim().is_empty() {
        GENERIC_FAILURE_MESSAGE.to_string()
    } else {
        message.to_string()
    }
}

/// Crate-level error type
#[derive(Error, Debug)]
pub enum BgRevealError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// HTTP client construction or request errors
    #[error("Network error: {0}")]
    Network(String),

    /// Upload intake rejected the file
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Processing submission failed
    #[error(transparent)]
    Processing(#[from] ProcessingError),

    /// A submission is already in flight
    #[error("A submission is already being processed")]
    Busy,

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BgRevealError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create network error with operation context
    pub fn network_error<E: std::fmt::Display>(operation: &str, error: E) -> Self {
        Self::Network(format!("{}: {}", operation, error))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {})",
            parameter, value, valid_range
        ))
    }

    /// Message suitable for showing to an end user
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => err.reason(),
            Self::Processing(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}
