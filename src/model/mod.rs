//! Classifier loading and inference

pub mod inference;
pub mod loader;

pub use inference::OnnxClassifier;
pub use loader::ModelLoader;

use anyhow::Result;

/// The scoring contract consumed by the pipeline.
///
/// Implementations are pure and deterministic; the pipeline never retrains
/// or mutates a classifier.
pub trait Classifier: Send + Sync {
    /// Ordered feature vocabulary, fixed at load time.
    fn feature_names(&self) -> &[String];

    /// Fraud probability in [0, 1] for each aligned feature row.
    fn predict_probability(&self, rows: &[Vec<f32>]) -> Result<Vec<f64>>;
}
