//! ONNX-backed classifier

use crate::config::ModelConfig;
use crate::model::loader::{LoadedArtifact, ModelLoader};
use crate::model::Classifier;
use anyhow::{anyhow, bail, ensure, Context, Result};
use ort::memory::Allocator;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType};
use std::sync::RwLock;
use tracing::debug;

/// Classifier backed by a single ONNX session.
///
/// `Session::run` needs mutable access, so the artifact sits behind an
/// `RwLock`; the vocabulary is cloned out at load time and served lock-free.
pub struct OnnxClassifier {
    feature_names: Vec<String>,
    artifact: RwLock<LoadedArtifact>,
}

impl OnnxClassifier {
    /// Load the classifier described by the model configuration.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let loader = ModelLoader::with_threads(config.onnx_threads)?;
        let artifact = loader.load(&config.model_path, &config.feature_names_path)?;
        Ok(Self::from_artifact(artifact))
    }

    pub fn from_artifact(artifact: LoadedArtifact) -> Self {
        Self {
            feature_names: artifact.feature_names.clone(),
            artifact: RwLock::new(artifact),
        }
    }
}

impl Classifier for OnnxClassifier {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_probability(&self, rows: &[Vec<f32>]) -> Result<Vec<f64>> {
        use ort::value::Tensor;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let width = self.feature_names.len();
        let mut flat = Vec::with_capacity(rows.len() * width);
        for row in rows {
            ensure!(
                row.len() == width,
                "Expected {} features per row, got {}",
                width,
                row.len()
            );
            flat.extend_from_slice(row);
        }

        // Input tensor shape [batch, num_features]
        let shape = vec![rows.len() as i64, width as i64];
        let input =
            Tensor::from_array((shape, flat)).context("Failed to create input tensor")?;

        let mut artifact = self
            .artifact
            .write()
            .map_err(|e| anyhow!("Lock error: {}", e))?;
        let input_name = artifact.input_name.clone();
        let output_name = artifact.output_name.clone();
        let outputs = artifact
            .session
            .run(ort::inputs![input_name.as_str() => input])?;

        extract_probabilities(&outputs, &output_name, rows.len())
    }
}

/// Pull per-row class-1 probabilities out of the session outputs.
///
/// Tree-model exporters disagree on layout: plain tensors (`[n, 2]`,
/// `[n, 1]` or `[n]`) and `seq(map(int64, float))` both occur in the wild.
fn extract_probabilities(
    outputs: &ort::session::SessionOutputs,
    output_name: &str,
    n: usize,
) -> Result<Vec<f64>> {
    if let Some(output) = outputs.get(output_name) {
        if let Some(probs) = probabilities_from_value(output, n) {
            return Ok(probs);
        }
    }

    // Fallback: try every non-label output.
    for (name, output) in outputs.iter() {
        if name.contains("label") {
            continue;
        }
        if let Some(probs) = probabilities_from_value(&output, n) {
            debug!(output = %name, "Extracted probabilities from fallback output");
            return Ok(probs);
        }
    }

    bail!(
        "Could not extract probabilities from model output '{}'",
        output_name
    )
}

fn probabilities_from_value(output: &ort::value::DynValue, n: usize) -> Option<Vec<f64>> {
    if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
        let dims: Vec<i64> = shape.iter().copied().collect();
        return probabilities_from_tensor(&dims, data, n);
    }
    if DynSequenceValueType::can_downcast(&output.dtype()) {
        return probabilities_from_sequence(output, n).ok();
    }
    None
}

fn probabilities_from_tensor(dims: &[i64], data: &[f32], n: usize) -> Option<Vec<f64>> {
    match dims {
        [rows, cols] if *rows as usize == n => {
            let cols = *cols as usize;
            if cols >= 2 {
                // [batch, num_classes]: class 1 is the fraud probability
                Some((0..n).map(|i| data[i * cols + 1] as f64).collect())
            } else if cols == 1 {
                Some(data.iter().take(n).map(|&v| v as f64).collect())
            } else {
                None
            }
        }
        [len] if *len as usize == n => Some(data.iter().map(|&v| v as f64).collect()),
        _ => None,
    }
}

/// `seq(map(int64, float))` layout: one map of class probabilities per row.
fn probabilities_from_sequence(output: &ort::value::DynValue, n: usize) -> Result<Vec<f64>> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| anyhow!("Failed to downcast to sequence: {}", e))?;
    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
    ensure!(
        maps.len() == n,
        "Expected {} probability maps, got {}",
        n,
        maps.len()
    );

    let mut probs = Vec::with_capacity(n);
    for map_value in &maps {
        let kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;
        let class_one = kv_pairs
            .iter()
            .find(|(class, _)| *class == 1)
            .map(|(_, p)| *p as f64);
        let prob = match class_one {
            Some(p) => p,
            None => kv_pairs
                .iter()
                .find(|(class, _)| *class == 0)
                .map(|(_, p)| 1.0 - *p as f64)
                .ok_or_else(|| anyhow!("No probability found in map"))?,
        };
        probs.push(prob);
    }
    Ok(probs)
}
