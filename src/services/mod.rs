//! Service layer separating reporting and format concerns from the pipeline

pub mod format;
pub mod progress;

pub use format::{ResultFormatHandler, DOWNLOAD_BASENAME};
pub use progress::{
    ConsoleProgressReporter, NoOpProgressReporter, ProgressReporter, ProgressTicker,
    ProgressUpdate,
};
