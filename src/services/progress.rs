//! Progress reporting service
//!
//! The remote endpoint gives no real progress information, so progress shown
//! to the user is synthetic: a ticker advances the session's progress on a
//! fixed cadence while a submission is in flight. The ticker is bound to one
//! submission and is cancelled when that submission ends or is superseded.
//!
//! Reporting is separated from the pipeline through [`ProgressReporter`],
//! allowing different frontends to implement their own progress handling.

use crate::config::ProgressConfig;
use crate::session::{SessionStore, Status, SubmissionId};
use instant::Instant;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Progress update for one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Submission the update belongs to
    pub submission: SubmissionId,
    /// Status at the time of the update
    pub status: Status,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Elapsed time since the submission started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    /// Create a progress update, measuring elapsed time from `start_time`
    #[must_use]
    pub fn new(submission: SubmissionId, status: Status, progress: u8, start_time: Instant) -> Self {
        Self {
            submission,
            status,
            progress,
            elapsed_ms: start_time.elapsed().as_millis() as u64,
        }
    }
}

/// Trait for reporting progress of processing submissions
pub trait ProgressReporter: Send + Sync {
    /// Report a progress update
    fn report_progress(&self, update: &ProgressUpdate);

    /// Report that a submission succeeded
    fn report_completion(&self, submission: SubmissionId, elapsed_ms: u64);

    /// Report that a submission failed
    fn report_error(&self, submission: SubmissionId, error: &str);
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: &ProgressUpdate) {}

    fn report_completion(&self, _submission: SubmissionId, _elapsed_ms: u64) {}

    fn report_error(&self, _submission: SubmissionId, _error: &str) {}
}

/// Console progress reporter that logs progress
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    /// Create a new console progress reporter
    ///
    /// # Arguments
    /// * `verbose` - Whether to log every tick or only milestones
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: &ProgressUpdate) {
        if self.verbose {
            log::info!(
                "[{}%] {} {} ({}ms elapsed)",
                update.progress,
                update.submission,
                update.status,
                update.elapsed_ms
            );
        } else if update.progress % 50 == 0 {
            log::info!("[{}%] {}", update.progress, update.status);
        }
    }

    fn report_completion(&self, submission: SubmissionId, elapsed_ms: u64) {
        log::info!("✅ Submission {} completed in {}ms", submission, elapsed_ms);
    }

    fn report_error(&self, submission: SubmissionId, error: &str) {
        log::error!("❌ Submission {} failed: {}", submission, error);
    }
}

/// Periodic task advancing the synthetic progress of one submission
///
/// Dropping the ticker stops it.
pub struct ProgressTicker {
    submission: SubmissionId,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ProgressTicker {
    /// Spawn a ticker for `submission`
    ///
    /// The first tick fires one interval after the call. Each tick advances
    /// progress by `cadence.step` up to `cadence.cap`; the task exits on its
    /// own once the submission is no longer current.
    #[must_use]
    pub fn start(
        store: SessionStore,
        submission: SubmissionId,
        cadence: ProgressConfig,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let start_time = Instant::now();

        let task = tokio::spawn(async move {
            let period = cadence.interval();
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);

            loop {
                tokio::select! {
                    biased;
                    () = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        if !store.is_current(submission) {
                            break;
                        }
                        if store.tick(submission, cadence.step, cadence.cap) {
                            let state = store.snapshot();
                            reporter.report_progress(&ProgressUpdate::new(
                                submission,
                                state.status,
                                state.progress,
                                start_time,
                            ));
                        }
                    }
                }
            }
            log::trace!("Progress ticker for {} exited", submission);
        });

        Self {
            submission,
            token,
            task: Some(task),
        }
    }

    /// Submission the ticker is bound to
    #[must_use]
    pub fn submission(&self) -> SubmissionId {
        self.submission
    }

    /// Whether the ticker has been stopped
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stop the ticker; no tick is applied after this returns
    pub fn stop(&mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ProgressTicker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTicker")
            .field("submission", &self.submission)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_handle::HandleRegistry;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingReporter {
        updates: Mutex<Vec<u8>>,
    }

    impl ProgressReporter for RecordingReporter {
        fn report_progress(&self, update: &ProgressUpdate) {
            self.updates.lock().unwrap().push(update.progress);
        }

        fn report_completion(&self, _submission: SubmissionId, _elapsed_ms: u64) {}

        fn report_error(&self, _submission: SubmissionId, _error: &str) {}
    }

    fn busy_store() -> (SessionStore, SubmissionId) {
        let registry = HandleRegistry::new();
        let store = SessionStore::new(registry.clone());
        let id = store.begin(registry.create(vec![1u8], "image/png"));
        (store, id)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_on_cadence_up_to_cap() {
        let (store, id) = busy_store();
        let reporter = Arc::new(RecordingReporter::default());
        let _ticker = ProgressTicker::start(
            store.clone(),
            id,
            ProgressConfig::default(),
            reporter.clone(),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.snapshot().progress, 0);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(store.snapshot().progress, 10);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.snapshot().progress, 90);
        assert_eq!(
            *reporter.updates.lock().unwrap(),
            vec![10, 20, 30, 40, 50, 60, 70, 80, 90]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_progress() {
        let (store, id) = busy_store();
        let mut ticker = ProgressTicker::start(
            store.clone(),
            id,
            ProgressConfig::default(),
            Arc::new(NoOpProgressReporter),
        );

        tokio::time::sleep(Duration::from_millis(450)).await;
        ticker.stop();
        assert!(ticker.is_stopped());
        let frozen = store.snapshot().progress;
        assert_eq!(frozen, 20);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.snapshot().progress, frozen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_ticker_does_not_touch_new_submission() {
        let (store, old) = busy_store();
        let _ticker = ProgressTicker::start(
            store.clone(),
            old,
            ProgressConfig::default(),
            Arc::new(NoOpProgressReporter),
        );
        tokio::time::sleep(Duration::from_millis(650)).await;

        let registry = store.registry().clone();
        store.begin(registry.create(vec![2u8], "image/png"));
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(store.snapshot().progress, 0);
    }
}
