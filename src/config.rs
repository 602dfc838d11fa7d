//! Configuration types for the upload and processing pipeline

use crate::error::{BgRevealError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default remote endpoint, matching the local proxy route of the web front end
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/api/remove-bg";

/// Default upload limit (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// MIME types accepted by the file picker
pub const DEFAULT_ACCEPTED_MIME_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp"];

/// Cadence of the synthetic progress ticker
///
/// The ticker is cosmetic: it advances `step` points every `interval_ms`
/// milliseconds and never goes past `cap` on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Milliseconds between ticks
    pub interval_ms: u64,
    /// Percentage points added per tick
    pub step: u8,
    /// Highest value the ticker may reach
    pub cap: u8,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            interval_ms: 200,
            step: 10,
            cap: 90,
        }
    }
}

impl ProgressConfig {
    /// Tick period as a `Duration`
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Configuration for the upload → process → compare pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// URL of the remote processing endpoint
    pub endpoint: String,

    /// Multipart field name carrying the image
    pub upload_field: String,

    /// Largest accepted upload in bytes
    pub max_upload_bytes: u64,

    /// MIME types accepted at intake
    pub accepted_mime_types: Vec<String>,

    /// Synthetic progress cadence
    pub progress: ProgressConfig,

    /// Pause after progress reaches 100 before the result is shown
    pub settle_delay_ms: u64,

    /// Overall timeout for the remote request
    pub request_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            upload_field: "image".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            accepted_mime_types: DEFAULT_ACCEPTED_MIME_TYPES
                .iter()
                .map(ToString::to_string)
                .collect(),
            progress: ProgressConfig::default(),
            settle_delay_ms: 500,
            request_timeout_secs: 120,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bg_reveal::PipelineConfig;
    ///
    /// let config = PipelineConfig::builder()
    ///     .endpoint("https://example.com/api/remove-bg")
    ///     .settle_delay_ms(250)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.settle_delay_ms, 250);
    /// ```
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load a configuration from a JSON file
    ///
    /// Missing fields fall back to their defaults.
    ///
    /// # Errors
    /// - File cannot be read
    /// - File is not valid JSON for this structure
    /// - Loaded values fail [`PipelineConfig::validate`]
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| BgRevealError::file_io_error("read config file", path, &e))?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            BgRevealError::invalid_config(format!(
                "Failed to parse config '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Settle delay as a `Duration`
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Request timeout as a `Duration`
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Endpoint is not an absolute http(s) URL
    /// - Upload field name is empty
    /// - Upload limit is zero
    /// - No accepted MIME types
    /// - Progress interval or step is zero, or the cap exceeds 100
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.endpoint).map_err(|e| {
            BgRevealError::invalid_config(format!("Invalid endpoint '{}': {}", self.endpoint, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(BgRevealError::invalid_config(format!(
                "Unsupported endpoint scheme '{}'. Use http or https.",
                url.scheme()
            )));
        }

        if self.upload_field.trim().is_empty() {
            return Err(BgRevealError::invalid_config("Upload field name is empty"));
        }

        if self.max_upload_bytes == 0 {
            return Err(BgRevealError::config_value_error(
                "upload limit",
                self.max_upload_bytes,
                "1 byte or more",
            ));
        }

        if self.accepted_mime_types.is_empty() {
            return Err(BgRevealError::invalid_config(
                "At least one accepted MIME type is required",
            ));
        }

        if self.progress.interval_ms == 0 {
            return Err(BgRevealError::config_value_error(
                "progress interval",
                self.progress.interval_ms,
                "1ms or more",
            ));
        }

        if self.progress.step == 0 {
            return Err(BgRevealError::config_value_error(
                "progress step",
                self.progress.step,
                "1-100",
            ));
        }

        if self.progress.cap > 100 {
            return Err(BgRevealError::config_value_error(
                "progress cap",
                self.progress.cap,
                "0-100",
            ));
        }

        Ok(())
    }
}

/// Builder for `PipelineConfig`
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set the remote endpoint URL
    #[must_use]
    pub fn endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Set the multipart field name
    #[must_use]
    pub fn upload_field<S: Into<String>>(mut self, field: S) -> Self {
        self.config.upload_field = field.into();
        self
    }

    /// Set the upload size limit
    #[must_use]
    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    /// Replace the accepted MIME types
    #[must_use]
    pub fn accepted_mime_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.accepted_mime_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Set the progress ticker cadence
    #[must_use]
    pub fn progress(mut self, progress: ProgressConfig) -> Self {
        self.config.progress = progress;
        self
    }

    /// Set the settle delay in milliseconds
    #[must_use]
    pub fn settle_delay_ms(mut self, delay_ms: u64) -> Self {
        self.config.settle_delay_ms = delay_ms;
        self
    }

    /// Set the request timeout in seconds
    #[must_use]
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Any rule checked by [`PipelineConfig::validate`]
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_upload_bytes, 10_485_760);
        assert_eq!(config.progress.interval_ms, 200);
        assert_eq!(config.progress.step, 10);
        assert_eq!(config.progress.cap, 90);
        assert_eq!(config.settle_delay_ms, 500);
        assert_eq!(config.accepted_mime_types.len(), 3);
    }

    #[test]
    fn test_builder_rejects_bad_endpoint() {
        assert!(PipelineConfig::builder().endpoint("not a url").build().is_err());
        assert!(PipelineConfig::builder()
            .endpoint("ftp://example.com/remove")
            .build()
            .is_err());
    }

    #[test]
    fn test_builder_rejects_bad_progress() {
        let result = PipelineConfig::builder()
            .progress(ProgressConfig {
                interval_ms: 200,
                step: 10,
                cap: 120,
            })
            .build();
        let err = result.unwrap_err();
        assert!(err.to_string().contains("progress cap"));
        assert!(err.to_string().contains("120"));

        let result = PipelineConfig::builder()
            .progress(ProgressConfig {
                interval_ms: 0,
                step: 10,
                cap: 90,
            })
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"endpoint":"https://example.com/api","settle_delay_ms":0}"#)
                .unwrap();
        assert_eq!(config.endpoint, "https://example.com/api");
        assert_eq!(config.settle_delay_ms, 0);
        assert_eq!(config.upload_field, "image");
        assert_eq!(config.progress, ProgressConfig::default());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{"max_upload_bytes": 1024}"#).unwrap();

        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.max_upload_bytes, 1024);

        std::fs::write(&path, r#"{"max_upload_bytes": 0}"#).unwrap();
        assert!(PipelineConfig::from_json_file(&path).is_err());

        let missing = dir.path().join("missing.json");
        let err = PipelineConfig::from_json_file(&missing).unwrap_err();
        assert!(err.to_string().contains("read config file"));
    }
}
