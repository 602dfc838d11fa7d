//! Remote processing backends
//!
//! The orchestrator talks to the background-removal service through the
//! [`ProcessingBackend`] trait:
//! - HTTP backend (multipart upload to the configured endpoint)
//! - Mock backend (scripted replies for tests and offline demos)

pub mod http;
pub mod mock;

pub use self::http::HttpBackend;
pub use self::mock::{MockBackend, MockOutcome};

use crate::error::ProcessingError;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// MIME type assumed when a successful response declares none
pub const DEFAULT_RESULT_MIME_TYPE: &str = "image/png";

/// One image submitted for processing
#[derive(Clone)]
pub struct ProcessingRequest {
    /// Original file name
    pub file_name: String,
    /// MIME type of `bytes`
    pub mime_type: String,
    /// Image data
    pub bytes: Arc<[u8]>,
}

impl std::fmt::Debug for ProcessingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingRequest")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

enum ResponseBody {
    Buffered { bytes: Vec<u8>, read_delay: Duration },
    Http(reqwest::Response),
}

/// Response whose headers have arrived but whose body may still be in transit
pub struct RemoteResponse {
    status: u16,
    content_type: Option<String>,
    body: ResponseBody,
}

impl RemoteResponse {
    /// Response backed by an in-memory body
    #[must_use]
    pub fn buffered(status: u16, content_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body: ResponseBody::Buffered {
                bytes,
                read_delay: Duration::ZERO,
            },
        }
    }

    /// Response backed by a live HTTP response
    #[must_use]
    pub fn from_http(response: reqwest::Response) -> Self {
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        Self {
            status: response.status().as_u16(),
            content_type,
            body: ResponseBody::Http(response),
        }
    }

    /// Delay reading an in-memory body, to simulate a slow download
    #[must_use]
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        if let ResponseBody::Buffered { read_delay, .. } = &mut self.body {
            *read_delay = delay;
        }
        self
    }

    /// HTTP status code
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Whether the status is 2xx
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Declared `Content-Type` header, if any
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Read the body and classify the response
    ///
    /// # Errors
    /// - [`ProcessingError::Transport`] if the body cannot be read
    pub async fn into_reply(self) -> Result<RemoteReply, ProcessingError> {
        let success = self.is_success();
        let bytes = match self.body {
            ResponseBody::Buffered { bytes, read_delay } => {
                if !read_delay.is_zero() {
                    tokio::time::sleep(read_delay).await;
                }
                bytes
            },
            ResponseBody::Http(response) => response
                .bytes()
                .await
                .map_err(|e| ProcessingError::Transport(e.to_string()))?
                .to_vec(),
        };

        if success {
            let mime_type = self
                .content_type
                .as_deref()
                .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
                .filter(|ct| !ct.is_empty())
                .unwrap_or_else(|| DEFAULT_RESULT_MIME_TYPE.to_string());
            Ok(RemoteReply::Image { bytes, mime_type })
        } else {
            Ok(RemoteReply::Rejected {
                status: self.status,
                message: parse_error_message(&bytes),
            })
        }
    }
}

impl std::fmt::Debug for RemoteResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Fully read and classified response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteReply {
    /// Processed image data
    Image {
        /// Image bytes
        bytes: Vec<u8>,
        /// Declared MIME type
        mime_type: String,
    },
    /// The service rejected the request
    Rejected {
        /// HTTP status code
        status: u16,
        /// `error` field of the JSON body, when present
        message: Option<String>,
    },
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Extract the `error` field from a JSON error body
#[must_use]
pub fn parse_error_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error)
}

/// Trait for services that remove image backgrounds
#[async_trait]
pub trait ProcessingBackend: Send + Sync {
    /// Send the image and wait for the response headers
    ///
    /// # Errors
    /// - [`ProcessingError::Transport`] for connection, timeout or request
    ///   construction failures
    async fn upload(&self, request: ProcessingRequest) -> Result<RemoteResponse, ProcessingError>;

    /// Short name for logs
    fn name(&self) -> &str;
}
