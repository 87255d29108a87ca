//! Incremental scoring loop.
//!
//! One synchronous cycle: load the already-scored id set, read the input
//! ledger, diff, validate, encode, classify, reconcile, stamp, sort, append.
//! The async driver repeats the cycle forever on a fixed interval and never
//! lets a cycle failure escape.

use crate::config::AppConfig;
use crate::encoder::{EncodedRow, FeatureEncoder};
use crate::ledger;
use crate::metrics::PipelineMetrics;
use crate::model::Classifier;
use crate::reconcile::Reconciler;
use crate::types::{CleanTransaction, ScoredRecord};
use anyhow::{ensure, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Wall-clock source, injectable so tests can drive cycles with a fixed
/// `processed_time` and no real delay.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Why a cycle produced no output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Input ledger missing, empty, or transiently unreadable
    InputUnavailable,
    /// Every input row is already in the output ledger
    NothingNew,
    /// Every new row failed validation or encoding
    AllRowsDropped,
}

/// Outcome of one scored batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Rows in the input ledger not yet scored
    pub new_rows: usize,
    /// Rows excluded by validation or encoding
    pub dropped: usize,
    /// Rows appended to the output ledger
    pub scored: usize,
    /// Appended rows with a fraud verdict
    pub fraud: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Skipped(SkipReason),
    Scored(CycleReport),
}

/// The long-running scoring service.
///
/// Single-threaded, single-writer: exactly one pipeline instance may run
/// against a given output ledger, since the dedup read and the append are
/// not atomic across processes.
pub struct ScoringPipeline<C, K = SystemClock> {
    config: AppConfig,
    classifier: C,
    encoder: FeatureEncoder,
    reconciler: Reconciler,
    clock: K,
    metrics: Arc<PipelineMetrics>,
}

impl<C, K> ScoringPipeline<C, K>
where
    C: Classifier,
    K: Clock,
{
    pub fn new(config: AppConfig, classifier: C, clock: K, metrics: Arc<PipelineMetrics>) -> Self {
        let reconciler = Reconciler::new(config.detection.threshold);
        Self {
            config,
            classifier,
            encoder: FeatureEncoder::new(),
            reconciler,
            clock,
            metrics,
        }
    }

    /// Run one scoring cycle.
    ///
    /// Errors returned here are per-cycle failures (output ledger I/O,
    /// inference); the driver logs them and retries on the next tick.
    pub fn run_cycle(&self) -> Result<CycleOutcome> {
        let input_path = Path::new(&self.config.stream.input_path);
        let output_path = Path::new(&self.config.stream.output_path);

        let already_scored = ledger::scored_ids(output_path)?;

        let Some(batch) = ledger::read_input(input_path) else {
            return Ok(CycleOutcome::Skipped(SkipReason::InputUnavailable));
        };
        let signal = batch.signal;

        // Diff against the output ledger; the id is the sole dedup key.
        // Rows without an id pass the diff and die in validation.
        let fresh: Vec<_> = batch
            .rows
            .into_iter()
            .filter(|row| {
                row.transaction_id
                    .as_deref()
                    .map_or(true, |id| !already_scored.contains(id))
            })
            .collect();
        if fresh.is_empty() {
            debug!("No new transactions to score");
            return Ok(CycleOutcome::Skipped(SkipReason::NothingNew));
        }

        let new_rows = fresh.len();
        info!(count = new_rows, "New transactions to score");

        let mut dropped = 0usize;
        let mut clean: Vec<CleanTransaction> = Vec::with_capacity(new_rows);
        for raw in fresh {
            match raw.validate() {
                Ok(tx) => clean.push(tx),
                Err(reason) => {
                    dropped += 1;
                    debug!(reason = %reason, "Dropped invalid row");
                }
            }
        }

        let mut encoded: Vec<(CleanTransaction, EncodedRow)> = Vec::with_capacity(clean.len());
        for tx in clean {
            match self.encoder.encode(&tx) {
                Ok(row) => encoded.push((tx, row)),
                Err(e) => {
                    dropped += 1;
                    debug!(transaction_id = %tx.transaction_id, error = %e, "Dropped row that failed encoding");
                }
            }
        }

        if dropped > 0 {
            warn!(dropped, "Dropped rows with missing, invalid, or extreme values");
        }
        if encoded.is_empty() {
            self.metrics.record_batch(0, dropped, 0);
            return Ok(CycleOutcome::Skipped(SkipReason::AllRowsDropped));
        }

        // One aligned batch through the classifier.
        let vocabulary = self.classifier.feature_names();
        let matrix: Vec<Vec<f32>> = encoded
            .iter()
            .map(|(_, row)| self.encoder.align(row, vocabulary))
            .collect();
        let probabilities = self.classifier.predict_probability(&matrix)?;
        ensure!(
            probabilities.len() == encoded.len(),
            "Classifier returned {} probabilities for {} rows",
            probabilities.len(),
            encoded.len()
        );

        // Same processed_time for the whole batch.
        let processed_at = self.clock.now();
        let mut records: Vec<_> = encoded
            .iter()
            .zip(probabilities.iter())
            .map(|((tx, row), &probability)| {
                let verdict = self.reconciler.reconcile(tx, probability, signal);
                (
                    row.event_time,
                    ScoredRecord::new(tx, row.event_time, processed_at, &verdict),
                )
            })
            .collect();
        records.sort_by_key(|(event_time, _)| *event_time);
        let records: Vec<ScoredRecord> = records.into_iter().map(|(_, record)| record).collect();

        ledger::append_scored(output_path, &records)?;

        let scored = records.len();
        let fraud = records.iter().filter(|r| r.fraud_prediction == 1).count();
        info!(scored, fraud, "Appended scored transactions");

        self.metrics.record_batch(scored, dropped, fraud);
        for record in &records {
            self.metrics.record_score(record.fraud_probability);
        }

        Ok(CycleOutcome::Scored(CycleReport {
            new_rows,
            dropped,
            scored,
            fraud,
        }))
    }

    /// Run the polling loop forever.
    ///
    /// There is no natural terminal state; the service runs until the
    /// process is killed. A failed cycle is logged and retried next tick.
    pub async fn run(&self) {
        let interval = Duration::from_secs(self.config.stream.poll_interval_secs);
        info!(
            input = %self.config.stream.input_path,
            output = %self.config.stream.output_path,
            interval_secs = self.config.stream.poll_interval_secs,
            threshold = self.reconciler.threshold(),
            "Starting incremental scoring loop"
        );

        loop {
            let started = Instant::now();
            match self.run_cycle() {
                Ok(CycleOutcome::Scored(report)) => {
                    self.metrics.record_cycle(started.elapsed());
                    debug!(?report, "Cycle complete");
                }
                Ok(CycleOutcome::Skipped(reason)) => {
                    self.metrics.record_cycle(started.elapsed());
                    debug!(?reason, "Cycle skipped");
                }
                Err(e) => {
                    warn!(error = %e, "Scoring cycle failed; retrying next tick");
                }
            }
            tokio::time::sleep(interval).await;
        }
    }
}
