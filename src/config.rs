//! Configuration management for the scoring service

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub stream: StreamConfig,
    pub model: ModelConfig,
    pub detection: DetectionConfig,
    pub logging: LoggingConfig,
}

/// Ledger paths and polling cadence
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// Input ledger, appended to by the external producer
    pub input_path: String,
    /// Output ledger of scored transactions
    pub output_path: String,
    /// Seconds to sleep between scoring cycles
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    5
}

/// Classifier artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Path to the ONNX model file
    pub model_path: String,
    /// Path to the feature vocabulary sidecar exported at training time
    pub feature_names_path: String,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// Detection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Model probability at or above which a transaction is flagged
    pub threshold: f64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from the default file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig {
                input_path: "data/realtime_stream.csv".to_string(),
                output_path: "data/scored_transactions.csv".to_string(),
                poll_interval_secs: 5,
            },
            model: ModelConfig {
                model_path: "models/fraud_classifier.onnx".to_string(),
                feature_names_path: "models/feature_info.json".to_string(),
                onnx_threads: 1,
            },
            detection: DetectionConfig { threshold: 0.75 },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
