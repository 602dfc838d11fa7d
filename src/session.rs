//! Session state: the single source of truth for one upload/process/display cycle
//!
//! State lives in a `tokio::sync::watch` channel. Every mutation goes through
//! the channel, which serializes writers and doubles as the observation
//! channel for views and progress subscribers. Mutations issued by
//! asynchronous continuations carry the [`SubmissionId`] they belong to and
//! are dropped once a newer submission (or a reset) has taken over.

use crate::image_handle::{HandleRegistry, ImageHandle};
use crate::tracing_config::events;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Lifecycle status of the current submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    /// Nothing submitted, or the previous cycle was reset/dismissed
    #[default]
    Idle,
    /// Intake is checking a file; validation is synchronous, so this is never published
    Validating,
    /// The image is being sent to the remote endpoint
    Uploading,
    /// The endpoint answered and the result body is being read
    AwaitingResult,
    /// The processed image is available
    Succeeded,
    /// Processing failed; an error message is available
    Failed,
}

impl Status {
    /// Whether a submission is in flight
    #[must_use]
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Uploading | Self::AwaitingResult)
    }

    /// Whether the status ends a submission
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Validating => write!(f, "validating"),
            Self::Uploading => write!(f, "uploading"),
            Self::AwaitingResult => write!(f, "awaiting-result"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Identity of a submission; advances on every new submission and reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SubmissionId(u64);

impl SubmissionId {
    fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Numeric value, for logging
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Snapshot of the session
///
/// Invariants maintained by [`SessionStore`]:
/// - `processed` is `Some` only when `status` is `Succeeded`
/// - `error_message` is `Some` only when `status` is `Failed`
/// - `progress` never decreases while `status` is busy
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    /// Preview of the submitted image
    pub original: Option<ImageHandle>,
    /// Image returned by the remote endpoint
    pub processed: Option<ImageHandle>,
    /// Current lifecycle status
    pub status: Status,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// User-facing error message
    pub error_message: Option<String>,
    /// Submission the state belongs to
    pub submission: SubmissionId,
}

impl SessionState {
    /// Whether the snapshot satisfies the session invariants
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        (self.processed.is_none() || self.status == Status::Succeeded)
            && (self.error_message.is_none() || self.status == Status::Failed)
            && self.progress <= 100
    }
}

/// Owner of the session state and the handles it references
#[derive(Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<SessionState>>,
    registry: HandleRegistry,
}

impl SessionStore {
    /// Create a store in the `Idle` state
    #[must_use]
    pub fn new(registry: HandleRegistry) -> Self {
        let (tx, _rx) = watch::channel(SessionState::default());
        Self {
            tx: Arc::new(tx),
            registry,
        }
    }

    /// Current state
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    /// Observe state changes, including every progress update
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Registry the store releases handles through
    #[must_use]
    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    /// Whether `submission` is still the current one
    #[must_use]
    pub fn is_current(&self, submission: SubmissionId) -> bool {
        self.tx.borrow().submission == submission
    }

    fn release_all(&self, state: &mut SessionState) {
        for handle in [state.original.take(), state.processed.take()].into_iter().flatten() {
            if self.registry.release(&handle) {
                events::handle_released(handle.locator(), "session cleared");
            }
        }
    }

    /// Start a new submission for `original`, superseding any previous one
    ///
    /// Handles held by the previous cycle are released. The new state is
    /// `Uploading` at 0%.
    pub fn begin(&self, original: ImageHandle) -> SubmissionId {
        let mut submission = SubmissionId::default();
        self.tx.send_modify(|state| {
            self.release_all(state);
            submission = state.submission.next();
            *state = SessionState {
                original: Some(original),
                processed: None,
                status: Status::Uploading,
                progress: 0,
                error_message: None,
                submission,
            };
        });
        submission
    }

    /// Apply one synthetic progress tick
    ///
    /// Advances by `step` without passing `cap`, only while the submission is
    /// current and busy. Returns whether the state changed.
    pub fn tick(&self, submission: SubmissionId, step: u8, cap: u8) -> bool {
        self.tx.send_if_modified(|state| {
            if state.submission != submission || !state.status.is_busy() || state.progress >= cap {
                return false;
            }
            state.progress = state.progress.saturating_add(step).min(cap);
            true
        })
    }

    /// Mark that the endpoint answered and the result is being read
    pub fn mark_awaiting(&self, submission: SubmissionId) -> bool {
        self.tx.send_if_modified(|state| {
            if state.submission != submission || state.status != Status::Uploading {
                return false;
            }
            state.status = Status::AwaitingResult;
            true
        })
    }

    /// Snap progress to 100% ahead of the success transition
    pub fn complete_progress(&self, submission: SubmissionId) -> bool {
        self.tx.send_if_modified(|state| {
            if state.submission != submission || !state.status.is_busy() || state.progress == 100 {
                return false;
            }
            state.progress = 100;
            true
        })
    }

    /// Enter `Succeeded` with the processed image
    ///
    /// Returns `false`, leaving the state untouched, if the submission was
    /// superseded; the caller is then responsible for releasing `processed`.
    pub fn succeed(&self, submission: SubmissionId, processed: &ImageHandle) -> bool {
        self.tx.send_if_modified(|state| {
            if state.submission != submission || !state.status.is_busy() {
                return false;
            }
            state.processed = Some(processed.clone());
            state.status = Status::Succeeded;
            state.progress = 100;
            state.error_message = None;
            true
        })
    }

    /// Enter `Failed`, releasing and clearing the original preview
    pub fn fail(&self, submission: SubmissionId, message: String) -> bool {
        self.tx.send_if_modified(|state| {
            if state.submission != submission || !state.status.is_busy() {
                return false;
            }
            self.release_all(state);
            state.status = Status::Failed;
            state.error_message = Some(message);
            true
        })
    }

    /// Clear a failure so the upload view is shown without the banner
    pub fn dismiss_error(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if state.status != Status::Failed {
                return false;
            }
            state.status = Status::Idle;
            state.error_message = None;
            state.progress = 0;
            true
        })
    }

    /// Return to `Idle`, releasing both handles unconditionally
    ///
    /// Any in-flight submission is superseded. Resetting an already idle
    /// session changes nothing observable.
    pub fn reset(&self) -> SubmissionId {
        let mut submission = SubmissionId::default();
        self.tx.send_if_modified(|state| {
            let pristine = state.original.is_none()
                && state.processed.is_none()
                && state.status == Status::Idle
                && state.progress == 0
                && state.error_message.is_none();
            if pristine {
                submission = state.submission;
                return false;
            }
            self.release_all(state);
            submission = state.submission.next();
            *state = SessionState {
                submission,
                ..SessionState::default()
            };
            true
        });
        submission
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &*self.tx.borrow())
            .finish()
    }
}
