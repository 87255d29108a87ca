//! ONNX artifact loading

use anyhow::{ensure, Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

/// A loaded classifier artifact: the session plus its training-time metadata.
pub struct LoadedArtifact {
    /// ONNX Runtime session
    pub session: Session,
    /// Input name for the model
    pub input_name: String,
    /// Output name for probabilities
    pub output_name: String,
    /// Ordered feature vocabulary the model was trained on
    pub feature_names: Vec<String>,
}

/// Feature vocabulary sidecar written by the training job.
#[derive(Debug, Deserialize)]
struct FeatureInfo {
    feature_names: Vec<String>,
}

/// Loader for the classifier artifact.
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    pub fn new() -> Result<Self> {
        Self::with_threads(1)
    }

    /// Create a loader with the given intra-op thread count.
    pub fn with_threads(onnx_threads: usize) -> Result<Self> {
        ort::init().commit()?;
        info!(onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load the model and its feature vocabulary.
    ///
    /// A missing or corrupt artifact here is fatal at process start; there
    /// is no degraded mode without a classifier.
    pub fn load<P: AsRef<Path>>(&self, model_path: P, features_path: P) -> Result<LoadedArtifact> {
        let model_path = model_path.as_ref();
        let features_path = features_path.as_ref();

        let raw = fs::read_to_string(features_path).with_context(|| {
            format!(
                "Failed to read feature vocabulary from {}",
                features_path.display()
            )
        })?;
        let info: FeatureInfo = serde_json::from_str(&raw).with_context(|| {
            format!("Corrupt feature vocabulary in {}", features_path.display())
        })?;
        ensure!(
            !info.feature_names.is_empty(),
            "Feature vocabulary in {} is empty",
            features_path.display()
        );

        info!(
            model = %model_path.display(),
            threads = self.onnx_threads,
            "Loading ONNX model"
        );
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load model from {:?}", model_path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob") || o.name.contains("output"))
            .map(|o| o.name.clone())
            .unwrap_or_else(|| {
                session
                    .outputs
                    .last()
                    .map(|o| o.name.clone())
                    .unwrap_or_else(|| "probabilities".to_string())
            });

        info!(
            input = %input_name,
            output = %output_name,
            features = info.feature_names.len(),
            "Model loaded successfully"
        );

        Ok(LoadedArtifact {
            session,
            input_name,
            output_name,
            feature_names: info.feature_names,
        })
    }
}
