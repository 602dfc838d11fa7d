//! HTTP backend: multipart upload to the remote background-removal endpoint

use super::{ProcessingBackend, ProcessingRequest, RemoteResponse};
use crate::config::PipelineConfig;
use crate::error::{BgRevealError, ProcessingError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use tracing::{debug, instrument, warn};

/// Backend posting images to a remote endpoint as `multipart/form-data`
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    endpoint: Url,
    field: String,
}

impl HttpBackend {
    /// Create a backend for the endpoint, field name and timeout in `config`
    ///
    /// # Errors
    /// - Endpoint is not a valid URL
    /// - Failed to create HTTP client
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            BgRevealError::invalid_config(format!("Invalid endpoint '{}': {}", config.endpoint, e))
        })?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| BgRevealError::network_error("Failed to create HTTP client", e))?;

        Ok(Self {
            client,
            endpoint,
            field: config.upload_field.clone(),
        })
    }

    /// Endpoint the backend posts to
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ProcessingBackend for HttpBackend {
    #[instrument(skip(self, request), fields(endpoint = %self.endpoint, file = %request.file_name, bytes = request.bytes.len()))]
    async fn upload(&self, request: ProcessingRequest) -> std::result::Result<RemoteResponse, ProcessingError> {
        let part = Part::bytes(request.bytes.to_vec())
            .file_name(request.file_name)
            .mime_str(&request.mime_type)
            .map_err(|e| ProcessingError::Transport(format!("Invalid MIME type: {}", e)))?;
        let form = Form::new().part(self.field.clone(), part);

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Request to processing endpoint failed");
                ProcessingError::Transport(e.to_string())
            })?;

        debug!(status = response.status().as_u16(), "Processing endpoint answered");
        Ok(RemoteResponse::from_http(response))
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_config() {
        let config = PipelineConfig::builder()
            .endpoint("https://example.com/api/remove-bg")
            .upload_field("file")
            .build()
            .unwrap();
        let backend = HttpBackend::new(&config).unwrap();
        assert_eq!(backend.endpoint().as_str(), "https://example.com/api/remove-bg");
        assert_eq!(backend.field, "file");
        assert_eq!(backend.name(), "http");
    }

    #[test]
    fn test_new_rejects_invalid_endpoint() {
        let config = PipelineConfig {
            endpoint: "::not-a-url".to_string(),
            ..PipelineConfig::default()
        };
        assert!(HttpBackend::new(&config).is_err());
    }
}
