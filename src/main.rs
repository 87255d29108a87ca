//! Fraud Scoring Pipeline - Main Entry Point
//!
//! Polls the input ledger, scores new transactions with the pretrained
//! classifier, reconciles upstream fraud signals, and appends the verdicts
//! to the output ledger.

use anyhow::Result;
use fraud_scoring_pipeline::{
    config::AppConfig,
    metrics::{MetricsReporter, PipelineMetrics},
    model::{Classifier, OnnxClassifier},
    pipeline::{ScoringPipeline, SystemClock},
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fraud_scoring_pipeline=info".parse()?),
        )
        .init();

    info!("Starting fraud scoring pipeline");

    // Load configuration
    let config = AppConfig::load()?;
    info!(
        threshold = config.detection.threshold,
        interval_secs = config.stream.poll_interval_secs,
        "Configuration loaded successfully"
    );

    // Load the classifier; a missing or corrupt artifact is fatal here.
    let classifier = OnnxClassifier::from_config(&config.model)?;
    info!(
        features = classifier.feature_names().len(),
        "Classifier loaded"
    );

    // Initialize metrics and the periodic reporter (summary every 30 seconds)
    let metrics = Arc::new(PipelineMetrics::new());
    let reporter = MetricsReporter::new(metrics.clone(), 30);
    tokio::spawn(async move {
        reporter.start().await;
    });

    let pipeline = ScoringPipeline::new(config, classifier, SystemClock, metrics);
    pipeline.run().await;

    Ok(())
}
