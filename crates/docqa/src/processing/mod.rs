//! Progress tracking for ingestion

mod progress;

pub use progress::{ProgressEvent, ProgressHub, ProgressReporter, Stage, Subscription};
