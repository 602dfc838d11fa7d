//! Mock backend implementation for testing and offline demos

use super::{ProcessingBackend, ProcessingRequest, RemoteResponse};
use crate::error::ProcessingError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Scripted reply of the mock backend
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Return the uploaded image unchanged, with its own content type
    Echo,
    /// Return the given image
    Image {
        /// Image bytes
        bytes: Vec<u8>,
        /// Declared content type
        content_type: String,
    },
    /// Answer with a non-success status and raw body
    Reject {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },
    /// Fail before any response arrives
    TransportFault(String),
}

impl MockOutcome {
    /// Rejection with a JSON `{"error": ...}` body
    #[must_use]
    pub fn rejected_with(status: u16, message: &str) -> Self {
        Self::Reject {
            status,
            body: serde_json::json!({ "error": message }).to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct MockStep {
    outcome: MockOutcome,
    latency: Duration,
}

/// Backend that answers from a script instead of the network
///
/// Each call consumes the next scripted step; once the script is exhausted
/// every call uses the default outcome. Latency is simulated with
/// `tokio::time::sleep`, so tests on a paused clock run instantly.
#[derive(Debug)]
pub struct MockBackend {
    script: Mutex<VecDeque<MockStep>>,
    default_outcome: MockOutcome,
    latency: Duration,
    read_delay: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<ProcessingRequest>>,
}

impl MockBackend {
    /// Backend that echoes uploads back, like the demo proxy route
    #[must_use]
    pub fn echo() -> Self {
        Self::with_default(MockOutcome::Echo)
    }

    /// Backend that answers every call with `outcome`
    #[must_use]
    pub fn with_default(outcome: MockOutcome) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_outcome: outcome,
            latency: Duration::ZERO,
            read_delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Delay before the response headers arrive
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Delay while the response body is read
    #[must_use]
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Queue an outcome using the backend's default latency
    #[must_use]
    pub fn then(self, outcome: MockOutcome) -> Self {
        let latency = self.latency;
        self.then_after(latency, outcome)
    }

    /// Queue an outcome with its own latency
    #[must_use]
    pub fn then_after(self, latency: Duration, outcome: MockOutcome) -> Self {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(MockStep { outcome, latency });
        self
    }

    /// Number of uploads received
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Uploads received so far
    #[must_use]
    pub fn requests(&self) -> Vec<ProcessingRequest> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn next_step(&self) -> MockStep {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| MockStep {
                outcome: self.default_outcome.clone(),
                latency: self.latency,
            })
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::echo()
    }
}

#[async_trait]
impl ProcessingBackend for MockBackend {
    async fn upload(&self, request: ProcessingRequest) -> Result<RemoteResponse, ProcessingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(request.clone());

        let step = self.next_step();
        if !step.latency.is_zero() {
            tokio::time::sleep(step.latency).await;
        }

        let response = match step.outcome {
            MockOutcome::Echo => RemoteResponse::buffered(
                200,
                Some(&request.mime_type),
                request.bytes.to_vec(),
            ),
            MockOutcome::Image {
                bytes,
                content_type,
            } => RemoteResponse::buffered(200, Some(&content_type), bytes),
            MockOutcome::Reject { status, body } => {
                RemoteResponse::buffered(status, Some("application/json"), body.into_bytes())
            },
            MockOutcome::TransportFault(message) => {
                return Err(ProcessingError::Transport(message));
            },
        };

        Ok(response.with_read_delay(self.read_delay))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::RemoteReply;
    use std::sync::Arc;

    fn request(bytes: &[u8]) -> ProcessingRequest {
        ProcessingRequest {
            file_name: "cat.png".to_string(),
            mime_type: "image/png".to_string(),
            bytes: Arc::from(bytes),
        }
    }

    #[tokio::test]
    async fn test_echo_returns_upload() {
        let backend = MockBackend::echo();
        let reply = backend
            .upload(request(&[1, 2, 3]))
            .await
            .unwrap()
            .into_reply()
            .await
            .unwrap();
        assert_eq!(
            reply,
            RemoteReply::Image {
                bytes: vec![1, 2, 3],
                mime_type: "image/png".to_string()
            }
        );
        assert_eq!(backend.call_count(), 1);
        assert_eq!(backend.requests()[0].file_name, "cat.png");
    }

    #[tokio::test]
    async fn test_script_then_default() {
        let backend = MockBackend::echo()
            .then(MockOutcome::rejected_with(400, "Could not identify foreground"))
            .then(MockOutcome::TransportFault("reset".to_string()));

        let first = backend.upload(request(&[1])).await.unwrap();
        assert_eq!(first.status(), 400);
        assert!(matches!(
            backend.upload(request(&[1])).await,
            Err(ProcessingError::Transport(_))
        ));
        assert!(backend.upload(request(&[1])).await.unwrap().is_success());
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_simulated() {
        let backend = MockBackend::echo().with_latency(Duration::from_secs(2));
        let start = tokio::time::Instant::now();
        backend.upload(request(&[1])).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
