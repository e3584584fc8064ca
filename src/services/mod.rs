//! Host-facing services: image I/O, output formats and progress reporting

pub mod format;
pub mod io;
pub mod progress;

pub use format::OutputFormatHandler;
pub use io::ImageIOService;
pub use progress::{NoOpProgressReporter, ProcessingStage, ProgressReporter, ProgressTracker, ProgressUpdate};
