//! Upload intake: file acceptance, validation and preview creation

use crate::config::PipelineConfig;
use crate::error::{BgRevealError, Result, ValidationError};
use crate::image_handle::{HandleRegistry, ImageHandle};
use image::ImageFormat;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// A file as supplied by the picker: name, declared MIME type and contents
#[derive(Clone)]
pub struct SelectedFile {
    /// File name as shown to the user
    pub name: String,
    /// Declared MIME type
    pub mime_type: String,
    /// File contents
    pub bytes: Arc<[u8]>,
}

impl SelectedFile {
    /// Create a selected file from in-memory data
    pub fn new<N, M>(name: N, mime_type: M, bytes: impl Into<Arc<[u8]>>) -> Self
    where
        N: Into<String>,
        M: Into<String>,
    {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, deriving its MIME type from the extension
    ///
    /// Unknown extensions yield `application/octet-stream`, which the
    /// intake then rejects.
    ///
    /// # Errors
    /// - File cannot be read
    pub async fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| BgRevealError::file_io_error("read input image", path, &e))?;
        let name = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());

        Ok(Self::new(name, mime_type_for_path(path), bytes))
    }

    /// Declared size in bytes
    #[must_use]
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl std::fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Guess a MIME type from a path's extension
#[must_use]
pub fn mime_type_for_path(path: &Path) -> String {
    ImageFormat::from_path(path).map_or_else(
        |_| "application/octet-stream".to_string(),
        |format| format.to_mime_type().to_string(),
    )
}

/// Lowercase a MIME type, drop parameters and fold the `image/jpg` alias
#[must_use]
pub fn normalize_mime_type(mime: &str) -> String {
    let essence = mime.split(';').next().unwrap_or(mime).trim().to_ascii_lowercase();
    if essence == "image/jpg" {
        "image/jpeg".to_string()
    } else {
        essence
    }
}

/// A file that passed intake validation, with its local preview
#[derive(Debug, Clone)]
pub struct AcceptedFile {
    /// File name as shown to the user
    pub name: String,
    /// Preview handle over the file bytes
    pub handle: ImageHandle,
}

impl AcceptedFile {
    /// Normalized MIME type of the file
    #[must_use]
    pub fn mime_type(&self) -> &str {
        self.handle.mime_type()
    }

    /// File contents
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.handle.bytes()
    }
}

/// Validates picker submissions and turns them into previewable handles
pub struct UploadIntake {
    max_upload_bytes: u64,
    accepted_mime_types: Vec<String>,
    registry: HandleRegistry,
    last_error: Mutex<Option<ValidationError>>,
}

impl UploadIntake {
    /// Create an intake using the limits from `config`
    #[must_use]
    pub fn new(config: &PipelineConfig, registry: HandleRegistry) -> Self {
        Self {
            max_upload_bytes: config.max_upload_bytes,
            accepted_mime_types: config
                .accepted_mime_types
                .iter()
                .map(|m| normalize_mime_type(m))
                .collect(),
            registry,
            last_error: Mutex::new(None),
        }
    }

    /// Validate a submission and create its preview handle
    ///
    /// Checks run in order: presence, size, MIME type. On success the preview
    /// locator is issued from the shared registry and ownership of the handle
    /// passes to the caller, which must release whatever preview it replaces.
    /// On failure no locator is issued and the rejection is kept for inline
    /// display until the next successful submission.
    ///
    /// # Errors
    /// - [`ValidationError::MissingFile`] when `file` is `None`
    /// - [`ValidationError::TooLarge`] when the file exceeds the upload limit
    /// - [`ValidationError::UnsupportedType`] when the MIME type is not accepted
    pub fn submit(
        &self,
        file: Option<SelectedFile>,
    ) -> std::result::Result<AcceptedFile, ValidationError> {
        let Some(file) = file else {
            return Err(self.reject(ValidationError::MissingFile));
        };

        let mime = self.validate(&file).map_err(|err| self.reject(err))?;
        self.set_last_error(None);

        let handle = self.registry.create(file.bytes, &mime);
        log::info!("Accepted {} ({} bytes, {})", file.name, handle.len(), mime);
        Ok(AcceptedFile {
            name: file.name,
            handle,
        })
    }

    fn validate(&self, file: &SelectedFile) -> std::result::Result<String, ValidationError> {
        if file.size() > self.max_upload_bytes {
            return Err(ValidationError::TooLarge {
                size: file.size(),
                limit: self.max_upload_bytes,
            });
        }

        let mime = normalize_mime_type(&file.mime_type);
        if !self.accepted_mime_types.contains(&mime) {
            return Err(ValidationError::UnsupportedType {
                mime: file.mime_type.clone(),
            });
        }

        Ok(mime)
    }

    fn reject(&self, err: ValidationError) -> ValidationError {
        log::warn!("Upload rejected: {}", err);
        self.set_last_error(Some(err.clone()));
        err
    }

    fn set_last_error(&self, err: Option<ValidationError>) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = err;
    }

    /// Most recent rejection, for inline display near the upload control
    #[must_use]
    pub fn last_error(&self) -> Option<ValidationError> {
        self.last_error
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Forget the most recent rejection
    pub fn clear_error(&self) {
        self.set_last_error(None);
    }

    /// Upload limit in bytes
    #[must_use]
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }
}
