// Dense network training and classification metrics for bulkclass.

pub mod layer;
pub mod metrics;
pub mod network;

pub use metrics::{ClassificationReport, ConfusionMatrix};
pub use network::DenseClassifier;
