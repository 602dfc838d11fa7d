//! Processing orchestrator
//!
//! Drives one submission through the remote backend: publishes `Uploading`,
//! runs the synthetic progress ticker, moves to `AwaitingResult` once the
//! endpoint answers, and finally publishes `Succeeded` or `Failed`. The
//! orchestrator is the only writer of processing-related session state.

use crate::{
    backends::{ProcessingBackend, ProcessingRequest, RemoteReply},
    config::PipelineConfig,
    error::ProcessingError,
    image_handle::ImageHandle,
    intake::AcceptedFile,
    services::{NoOpProgressReporter, ProgressReporter, ProgressTicker},
    session::{SessionState, SessionStore, SubmissionId},
    tracing_config::{events, spans},
};
use instant::Instant;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn, Instrument};

/// Processed image data read from the remote endpoint
struct ProcessedImage {
    bytes: Vec<u8>,
    mime_type: String,
}

/// Coordinates the remote call, progress ticker and session transitions
pub struct ProcessingOrchestrator {
    backend: Arc<dyn ProcessingBackend>,
    store: SessionStore,
    config: PipelineConfig,
    reporter: Arc<dyn ProgressReporter>,
}

impl ProcessingOrchestrator {
    /// Create an orchestrator writing to `store`
    #[must_use]
    pub fn new(backend: Arc<dyn ProcessingBackend>, store: SessionStore, config: PipelineConfig) -> Self {
        Self {
            backend,
            store,
            config,
            reporter: Arc::new(NoOpProgressReporter),
        }
    }

    /// Replace the progress reporter
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Session store the orchestrator writes to
    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Observe status and progress changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.store.subscribe()
    }

    /// Name of the backend in use
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Process an accepted file
    ///
    /// Starting a submission supersedes the previous one: its handles are
    /// released, its ticker stops acting on the state and its eventual
    /// result is discarded. The previous request itself is not aborted.
    ///
    /// On success the processed image handle is returned and also stored in
    /// the session. Progress reaches 100 and stays there for the configured
    /// settle delay before the success transition is published.
    ///
    /// # Errors
    /// - [`ProcessingError::Rejected`] when the endpoint answers non-2xx
    /// - [`ProcessingError::Transport`] on network faults
    /// - [`ProcessingError::EmptyResult`] when a 2xx response has no body
    /// - [`ProcessingError::Superseded`] when a newer submission or a reset
    ///   took over; the session is left untouched in that case
    pub async fn process(&self, file: AcceptedFile) -> Result<ImageHandle, ProcessingError> {
        let start_time = Instant::now();
        let submission = self.store.begin(file.handle.clone());
        let span = spans::submission(submission, &file.name, self.backend.name());

        async move {
            info!("Submission started ({} bytes)", file.handle.len());

            let mut ticker = ProgressTicker::start(
                self.store.clone(),
                submission,
                self.config.progress,
                Arc::clone(&self.reporter),
            );
            let outcome = self.fetch(submission, &file).await;
            ticker.stop();

            match outcome {
                Ok(processed) => self.finish_success(submission, processed, start_time).await,
                Err(err) => Err(self.finish_failure(submission, err)),
            }
        }
        .instrument(span)
        .await
    }

    async fn fetch(
        &self,
        submission: SubmissionId,
        file: &AcceptedFile,
    ) -> Result<ProcessedImage, ProcessingError> {
        let request = ProcessingRequest {
            file_name: file.name.clone(),
            mime_type: file.mime_type().to_string(),
            bytes: file.handle.shared_bytes(),
        };

        let remote_span = spans::remote_call(self.backend.name(), request.bytes.len());
        async {
            let response = self.backend.upload(request).await?;
            debug!(status = response.status(), "Response headers received");

            if self.store.mark_awaiting(submission) {
                let state = self.store.snapshot();
                events::progress(submission, state.status, state.progress);
            } else if !self.store.is_current(submission) {
                return Err(ProcessingError::Superseded);
            }

            match response.into_reply().await? {
                RemoteReply::Image { bytes, .. } if bytes.is_empty() => Err(ProcessingError::EmptyResult),
                RemoteReply::Image { bytes, mime_type } => Ok(ProcessedImage { bytes, mime_type }),
                RemoteReply::Rejected { status, message } => {
                    Err(ProcessingError::Rejected { status, message })
                },
            }
        }
        .instrument(remote_span)
        .await
    }

    async fn finish_success(
        &self,
        submission: SubmissionId,
        processed: ProcessedImage,
        start_time: Instant,
    ) -> Result<ImageHandle, ProcessingError> {
        if !self.store.complete_progress(submission) && !self.store.is_current(submission) {
            debug!("Result arrived for a superseded submission; discarded");
            return Err(ProcessingError::Superseded);
        }
        events::progress(submission, self.store.snapshot().status, 100);

        let settle = self.config.settle_delay();
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
        if !self.store.is_current(submission) {
            debug!("Submission superseded during settle delay; result discarded");
            return Err(ProcessingError::Superseded);
        }

        let registry = self.store.registry();
        let handle = registry.create(processed.bytes, &processed.mime_type);
        if !self.store.succeed(submission, &handle) {
            if registry.release(&handle) {
                events::handle_released(handle.locator(), "submission superseded");
            }
            return Err(ProcessingError::Superseded);
        }

        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        info!(
            elapsed_ms,
            mime_type = %handle.mime_type(),
            bytes = handle.len(),
            "Submission succeeded"
        );
        self.reporter.report_completion(submission, elapsed_ms);
        Ok(handle)
    }

    fn finish_failure(&self, submission: SubmissionId, err: ProcessingError) -> ProcessingError {
        if matches!(err, ProcessingError::Superseded) {
            return err;
        }

        let message = err.user_message();
        if !self.store.fail(submission, message.clone()) {
            warn!(error = %err, "Failure of a superseded submission ignored");
            return ProcessingError::Superseded;
        }

        events::error_with_context(&err, "remote background removal");
        self.reporter.report_error(submission, &message);
        err
    }
}

impl std::fmt::Debug for ProcessingOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingOrchestrator")
            .field("backend", &self.backend.name())
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
