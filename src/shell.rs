//! Presentation shell
//!
//! Wires intake, orchestrator and reveal control together and derives the
//! screen to show from session state.

use crate::{
    backends::ProcessingBackend,
    config::PipelineConfig,
    error::{BgRevealError, Result},
    image_handle::{HandleRegistry, ImageHandle},
    intake::{SelectedFile, UploadIntake},
    processor::ProcessingOrchestrator,
    reveal::{Bounds, DocumentListeners, PointerEvent, RevealControl},
    services::{ProgressReporter, ResultFormatHandler},
    session::{SessionState, SessionStore, Status},
};
use image::RgbaImage;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{info, instrument};

/// Message shown with the loading indicator
pub const LOADING_MESSAGE: &str = "Processing HD Image...";

/// Screen derived from session state
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    /// File picker
    Upload {
        /// Validation error shown next to the picker
        inline_error: Option<String>,
        /// Dismissible processing error banner
        banner: Option<String>,
    },
    /// Blurred preview of the original with a progress indicator
    Loading {
        /// Preview shown behind the indicator
        placeholder: ImageHandle,
        /// Progress percentage
        progress: u8,
        /// Text shown with the indicator
        message: &'static str,
    },
    /// Before/after comparison
    Comparison {
        /// Original image
        before: ImageHandle,
        /// Processed image
        after: ImageHandle,
        /// Divider position
        split_percent: f64,
    },
}

/// Processed image ready to be saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadArtifact {
    /// Suggested file name
    pub file_name: String,
    /// MIME type of `bytes`
    pub mime_type: String,
    /// Image data
    pub bytes: Arc<[u8]>,
}

impl DownloadArtifact {
    /// Write the image to `path`
    ///
    /// # Errors
    /// - File cannot be written
    pub async fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        tokio::fs::write(path, &self.bytes)
            .await
            .map_err(|e| BgRevealError::file_io_error("write processed image", path, &e))
    }
}

/// Top-level controller for one upload → process → compare screen
pub struct PresentationShell {
    store: SessionStore,
    intake: UploadIntake,
    orchestrator: ProcessingOrchestrator,
    listeners: DocumentListeners,
    reveal: Mutex<Option<RevealControl>>,
}

impl PresentationShell {
    /// Create a shell talking to `backend`
    ///
    /// # Errors
    /// - `config` fails validation
    pub fn new(config: PipelineConfig, backend: Arc<dyn ProcessingBackend>) -> Result<Self> {
        config.validate()?;
        let registry = HandleRegistry::new();
        let store = SessionStore::new(registry.clone());
        let intake = UploadIntake::new(&config, registry);
        let orchestrator = ProcessingOrchestrator::new(backend, store.clone(), config);

        Ok(Self {
            store,
            intake,
            orchestrator,
            listeners: DocumentListeners::new(),
            reveal: Mutex::new(None),
        })
    }

    /// Replace the progress reporter used by the orchestrator
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.orchestrator = self.orchestrator.with_reporter(reporter);
        self
    }

    fn reveal_slot(&self) -> MutexGuard<'_, Option<RevealControl>> {
        self.reveal
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Validate and process a picked file
    ///
    /// Submitting is refused while a submission is in flight. A rejected file
    /// leaves the session untouched and its reason is shown inline.
    ///
    /// # Errors
    /// - [`BgRevealError::Busy`] while uploading or awaiting a result
    /// - [`BgRevealError::Validation`] when intake rejects the file
    /// - [`BgRevealError::Processing`] when processing fails or is superseded
    #[instrument(skip_all, fields(backend = self.orchestrator.backend_name()))]
    pub async fn submit(&self, file: Option<SelectedFile>) -> Result<ImageHandle> {
        if self.store.snapshot().status.is_busy() {
            return Err(BgRevealError::Busy);
        }

        let accepted = self.intake.submit(file)?;
        self.reveal_slot().take();
        info!(file = %accepted.name, "Submitting image");

        Ok(self.orchestrator.process(accepted).await?)
    }

    /// Run `f` on the comparison, creating it for a fresh result
    ///
    /// Returns `None` unless the session succeeded. A comparison left over
    /// from an earlier result is dropped, detaching any drag listeners.
    fn with_reveal<R>(&self, f: impl FnOnce(&mut RevealControl) -> R) -> Option<R> {
        let state = self.store.snapshot();
        let mut slot = self.reveal_slot();
        let (Status::Succeeded, Some(before), Some(after)) =
            (state.status, state.original, state.processed)
        else {
            slot.take();
            return None;
        };

        let current = slot
            .take()
            .filter(|reveal| reveal.before() == &before && reveal.after() == &after);
        let reveal = slot.insert(
            current.unwrap_or_else(|| RevealControl::new(before, after, self.listeners.clone())),
        );
        Some(f(reveal))
    }

    /// Screen for the current state
    #[must_use]
    pub fn view(&self) -> View {
        let comparison = self.with_reveal(|reveal| {
            (
                reveal.before().clone(),
                reveal.after().clone(),
                reveal.split_percent(),
            )
        });
        if let Some((before, after, split_percent)) = comparison {
            return View::Comparison {
                before,
                after,
                split_percent,
            };
        }

        let state = self.store.snapshot();
        let inline_error = self.intake.last_error().map(|err| err.reason());
        match (state.status, state.original) {
            (Status::Uploading | Status::AwaitingResult, Some(placeholder)) => View::Loading {
                placeholder,
                progress: state.progress,
                message: LOADING_MESSAGE,
            },
            (Status::Failed, _) => View::Upload {
                inline_error,
                banner: state.error_message,
            },
            _ => View::Upload {
                inline_error,
                banner: None,
            },
        }
    }

    /// Forward a pointer event to the comparison, if shown
    pub fn handle_pointer(&self, event: &PointerEvent) -> bool {
        self.with_reveal(|reveal| reveal.handle_event(event))
            .unwrap_or(false)
    }

    /// Update the on-screen bounds of the comparison, if shown
    pub fn set_reveal_bounds(&self, bounds: Bounds) {
        self.with_reveal(|reveal| reveal.set_bounds(bounds));
    }

    /// Move the comparison divider, if shown
    pub fn set_split(&self, percent: f64) {
        self.with_reveal(|reveal| reveal.set_split(percent));
    }

    /// Render the comparison at its current split
    ///
    /// Returns `None` unless the session succeeded.
    ///
    /// # Errors
    /// - Either image cannot be decoded
    pub fn render_comparison(&self) -> Result<Option<RgbaImage>> {
        self.with_reveal(|reveal| reveal.render()).transpose()
    }

    /// Processed image with its suggested file name
    #[must_use]
    pub fn download(&self) -> Option<DownloadArtifact> {
        let state = self.store.snapshot();
        if state.status != Status::Succeeded {
            return None;
        }
        let processed = state.processed?;
        Some(DownloadArtifact {
            file_name: ResultFormatHandler::download_file_name(processed.mime_type()),
            mime_type: processed.mime_type().to_string(),
            bytes: processed.shared_bytes(),
        })
    }

    /// Hide the error banner and return to the upload view
    pub fn dismiss_error(&self) -> bool {
        self.store.dismiss_error()
    }

    /// Clear the session and release both image handles
    ///
    /// An in-flight submission is superseded; its result will be discarded.
    pub fn reset(&self) {
        self.reveal_slot().take();
        self.intake.clear_error();
        let submission = self.store.reset();
        info!(%submission, "Session reset");
    }

    /// Current session state
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.store.snapshot()
    }

    /// Observe session changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.store.subscribe()
    }

    /// Registry issuing the image locators
    #[must_use]
    pub fn registry(&self) -> &HandleRegistry {
        self.store.registry()
    }

    /// Listeners attached at the document level
    #[must_use]
    pub fn document_listeners(&self) -> &DocumentListeners {
        &self.listeners
    }
}

impl std::fmt::Debug for PresentationShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresentationShell")
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{MockBackend, MockOutcome};
    use crate::reveal::{PointerPhase, PointerTarget};
    use std::time::Duration;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, image::Rgba([200, 10, 10, 255]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    fn shell(backend: MockBackend) -> PresentationShell {
        PresentationShell::new(PipelineConfig::default(), Arc::new(backend)).unwrap()
    }

    #[test]
    fn test_initial_view_is_upload() {
        let shell = shell(MockBackend::echo());
        assert_eq!(
            shell.view(),
            View::Upload {
                inline_error: None,
                banner: None
            }
        );
        assert!(shell.download().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_file_shows_inline_error() {
        let shell = shell(MockBackend::echo());
        let file = SelectedFile::new("anim.gif", "image/gif", vec![0u8; 8]);

        let err = shell.submit(Some(file)).await.unwrap_err();
        assert!(matches!(err, BgRevealError::Validation(_)));
        assert_eq!(shell.snapshot().status, Status::Idle);
        assert!(matches!(
            shell.view(),
            View::Upload { inline_error: Some(ref reason), banner: None } if reason.contains("image/gif")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_shows_comparison_and_download() {
        let shell = shell(MockBackend::echo());
        let file = SelectedFile::new("cat.png", "image/png", png_bytes(8, 4));

        let processed = shell.submit(Some(file)).await.unwrap();
        match shell.view() {
            View::Comparison {
                after,
                split_percent,
                ..
            } => {
                assert_eq!(after, processed);
                assert_eq!(split_percent, 50.0);
            },
            other => panic!("unexpected view: {:?}", other),
        }

        let artifact = shell.download().unwrap();
        assert_eq!(artifact.file_name, "removed-bg-hd.png");
        assert_eq!(artifact.mime_type, "image/png");

        let composite = shell.render_comparison().unwrap().unwrap();
        assert_eq!(composite.dimensions(), (8, 4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_submit_is_refused() {
        let backend = MockBackend::echo().with_latency(Duration::from_secs(5));
        let shell = Arc::new(shell(backend));

        let pending = {
            let shell = Arc::clone(&shell);
            tokio::spawn(async move {
                let file = SelectedFile::new("a.png", "image/png", vec![1u8; 4]);
                shell.submit(Some(file)).await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let file = SelectedFile::new("b.png", "image/png", vec![2u8; 4]);
        assert!(matches!(shell.submit(Some(file)).await, Err(BgRevealError::Busy)));
        assert!(matches!(shell.view(), View::Loading { message: LOADING_MESSAGE, .. }));

        pending.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_banner_and_dismiss() {
        let backend = MockBackend::with_default(MockOutcome::rejected_with(402, "Insufficient credits"));
        let shell = shell(backend);
        let file = SelectedFile::new("cat.png", "image/png", vec![1u8; 4]);

        assert!(shell.submit(Some(file)).await.is_err());
        assert_eq!(
            shell.view(),
            View::Upload {
                inline_error: None,
                banner: Some("Insufficient credits".to_string())
            }
        );

        assert!(shell.dismiss_error());
        assert_eq!(
            shell.view(),
            View::Upload {
                inline_error: None,
                banner: None
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_mid_drag_releases_everything() {
        let shell = shell(MockBackend::echo());
        let file = SelectedFile::new("cat.png", "image/png", png_bytes(4, 4));
        shell.submit(Some(file)).await.unwrap();

        assert!(matches!(shell.view(), View::Comparison { .. }));
        shell.set_reveal_bounds(Bounds::new(0.0, 200.0));
        assert!(shell.handle_pointer(&PointerEvent::mouse(
            PointerPhase::Down,
            100.0,
            PointerTarget::Handle
        )));
        shell.handle_pointer(&PointerEvent::mouse(
            PointerPhase::Move,
            50.0,
            PointerTarget::Document,
        ));
        assert!(matches!(shell.view(), View::Comparison { split_percent, .. } if split_percent == 25.0));
        assert!(!shell.document_listeners().is_empty());

        shell.reset();
        assert!(shell.document_listeners().is_empty());
        assert_eq!(shell.registry().live_count(), 0);
        assert_eq!(
            shell.view(),
            View::Upload {
                inline_error: None,
                banner: None
            }
        );
    }
}
