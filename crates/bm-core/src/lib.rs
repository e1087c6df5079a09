/// Configuration, dataset types, and shared traits for bulkclass.
///
/// This crate contains the run configuration, the row-aligned
/// feature/label container, and the classifier seam used across the
/// bulkclass workspace.

pub mod config;
pub mod dataset;
pub mod error;
pub mod traits;

pub use config::PipelineConfig;
pub use dataset::Dataset;
pub use error::CoreError;
pub use traits::{Classifier, TrainingHistory};
