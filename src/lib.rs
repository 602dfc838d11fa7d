#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # bg-reveal
//!
//! Upload pipeline and before/after reveal control for a remote
//! background-removal service.
//!
//! The crate models one interactive screen without a browser: a file is
//! validated by the upload intake, sent to the remote endpoint by the
//! processing orchestrator while a synthetic progress indicator advances,
//! and the result is shown next to the original in a draggable split view.
//!
//! ## Features
//!
//! - **Upload intake**: presence, size (10MB) and type (PNG, JPG, WEBP) checks
//! - **Session state**: one observable state per screen, published over a
//!   `tokio::sync::watch` channel
//! - **Synthetic progress**: cancellable ticker bound to the submission
//! - **Stale-result protection**: superseded submissions never touch state
//! - **Image handles**: locator registry with explicit release accounting
//! - **Reveal control**: document-level drag handling and composite rendering
//! - **CLI Integration**: Optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bg_reveal::{HttpBackend, PipelineConfig, PresentationShell, SelectedFile, View};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = PipelineConfig::builder()
//!     .endpoint("http://localhost:3000/api/remove-bg")
//!     .build()?;
//! let backend = HttpBackend::new(&config)?;
//! let shell = PresentationShell::new(config, Arc::new(backend))?;
//!
//! let file = SelectedFile::from_path("portrait.jpg").await?;
//! shell.submit(Some(file)).await?;
//!
//! if let View::Comparison { split_percent, .. } = shell.view() {
//!     println!("Comparing at {split_percent}%");
//! }
//! if let Some(artifact) = shell.download() {
//!     artifact.write_to(&artifact.file_name).await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): Command-line interface, progress bar and tracing subscriber setup
//! - `webp-support` (default): WebP decoding for previews and composites
//! - `tracing-json`: JSON log output for the CLI

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod image_handle;
pub mod intake;
pub mod processor;
pub mod reveal;
pub mod services;
pub mod session;
pub mod shell;
pub mod tracing_config;

// Public API exports
pub use backends::{
    HttpBackend, MockBackend, MockOutcome, ProcessingBackend, ProcessingRequest, RemoteReply,
    RemoteResponse,
};
pub use config::{PipelineConfig, PipelineConfigBuilder, ProgressConfig};
pub use error::{BgRevealError, ProcessingError, Result, ValidationError};
pub use image_handle::{HandleRegistry, ImageHandle, RegistryStats};
pub use intake::{AcceptedFile, SelectedFile, UploadIntake};
pub use processor::ProcessingOrchestrator;
pub use reveal::{
    compose, Bounds, DocumentListeners, DragSession, PointerEvent, PointerPhase, PointerSource,
    PointerTarget, RevealControl,
};
pub use services::{
    ConsoleProgressReporter, NoOpProgressReporter, ProgressReporter, ProgressTicker,
    ProgressUpdate, ResultFormatHandler,
};
pub use session::{SessionState, SessionStore, Status, SubmissionId};
pub use shell::{DownloadArtifact, PresentationShell, View, LOADING_MESSAGE};
pub use tracing_config::{events, spans, TracingConfig, TracingFormat};

#[cfg(feature = "cli")]
pub use tracing_config::init_cli_tracing;
