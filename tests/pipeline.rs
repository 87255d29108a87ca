//! End-to-end scoring loop tests, driven synchronously with a stub
//! classifier and temp-dir ledgers.

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use fraud_scoring_pipeline::config::AppConfig;
use fraud_scoring_pipeline::metrics::PipelineMetrics;
use fraud_scoring_pipeline::model::Classifier;
use fraud_scoring_pipeline::pipeline::{
    Clock, CycleOutcome, CycleReport, ScoringPipeline, SkipReason,
};
use fraud_scoring_pipeline::types::ScoredRecord;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const BASE_HEADER: &str =
    "transaction_id,timestamp,sender_account,receiver_account,amount,transaction_type,location";

/// Deterministic classifier: the probability is the `amount` feature scaled
/// into [0, 1], so an amount of 7500 scores exactly 0.75.
struct StubClassifier {
    names: Vec<String>,
}

impl StubClassifier {
    fn new() -> Self {
        let names = [
            "amount",
            "hour",
            "day_of_week",
            "amount_log",
            "transaction_type_TRANSFER",
            "location_Delhi",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        Self { names }
    }
}

impl Classifier for StubClassifier {
    fn feature_names(&self) -> &[String] {
        &self.names
    }

    fn predict_probability(&self, rows: &[Vec<f32>]) -> Result<Vec<f64>> {
        Ok(rows
            .iter()
            .map(|row| ((row[0] as f64) / 10_000.0).min(1.0))
            .collect())
    }
}

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

struct Harness {
    _dir: TempDir,
    input_path: PathBuf,
    output_path: PathBuf,
    pipeline: ScoringPipeline<StubClassifier, FixedClock>,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("realtime_stream.csv");
        let output_path = dir.path().join("scored_transactions.csv");

        let mut config = AppConfig::default();
        config.stream.input_path = input_path.to_string_lossy().into_owned();
        config.stream.output_path = output_path.to_string_lossy().into_owned();

        let pipeline = ScoringPipeline::new(
            config,
            StubClassifier::new(),
            FixedClock(Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap()),
            Arc::new(PipelineMetrics::new()),
        );

        Self {
            _dir: dir,
            input_path,
            output_path,
            pipeline,
        }
    }

    fn write_input(&self, header: &str, rows: &[&str]) {
        let mut body = String::from(header);
        for row in rows {
            body.push('\n');
            body.push_str(row);
        }
        body.push('\n');
        fs::write(&self.input_path, body).unwrap();
    }

    fn append_input(&self, row: &str) {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.input_path)
            .unwrap();
        writeln!(file, "{}", row).unwrap();
    }

    fn output(&self) -> Vec<ScoredRecord> {
        let mut reader = csv::Reader::from_path(&self.output_path).unwrap();
        reader
            .deserialize()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap()
    }
}

#[test]
fn scores_new_transactions_and_never_rescored() {
    let harness = Harness::new();
    harness.write_input(
        BASE_HEADER,
        &[
            "tx-1,2026-08-07 10:00:00,AC1,AC2,2000,TRANSFER,Delhi",
            "tx-2,2026-08-07 10:00:05,AC3,AC4,8000,TRANSFER,Delhi",
        ],
    );

    let outcome = harness.pipeline.run_cycle().unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::Scored(CycleReport {
            new_rows: 2,
            dropped: 0,
            scored: 2,
            fraud: 1,
        })
    );

    // Dedup idempotence: the same input produces nothing on later cycles.
    let outcome = harness.pipeline.run_cycle().unwrap();
    assert_eq!(outcome, CycleOutcome::Skipped(SkipReason::NothingNew));

    let records = harness.output();
    assert_eq!(records.len(), 2);

    let low = records.iter().find(|r| r.transaction_id == "tx-1").unwrap();
    assert_eq!(low.fraud_prediction, 0);
    assert_eq!(low.fraud_probability, 0.2);

    let high = records.iter().find(|r| r.transaction_id == "tx-2").unwrap();
    assert_eq!(high.fraud_prediction, 1);
    assert_eq!(high.fraud_probability, 0.8);

    // The whole batch shares the injected wall-clock stamp.
    for record in &records {
        assert_eq!(record.processed_time, "2026-08-07 12:00:00");
    }

    // Header written exactly once.
    let content = fs::read_to_string(&harness.output_path).unwrap();
    let headers = content
        .lines()
        .filter(|l| l.starts_with("transaction_id"))
        .count();
    assert_eq!(headers, 1);
}

#[test]
fn late_arrivals_are_scored_exactly_once() {
    let harness = Harness::new();
    harness.write_input(
        BASE_HEADER,
        &["tx-1,2026-08-07 10:00:00,AC1,AC2,100,UPI,Mumbai"],
    );
    harness.pipeline.run_cycle().unwrap();

    harness.append_input("tx-2,2026-08-07 10:00:30,AC3,AC4,200,UPI,Mumbai");
    let outcome = harness.pipeline.run_cycle().unwrap();
    assert!(matches!(
        outcome,
        CycleOutcome::Scored(CycleReport { scored: 1, .. })
    ));

    let records = harness.output();
    let mut ids: Vec<_> = records.iter().map(|r| r.transaction_id.clone()).collect();
    ids.sort();
    assert_eq!(ids, vec!["tx-1".to_string(), "tx-2".to_string()]);
}

#[test]
fn upstream_flag_overrides_model() {
    let harness = Harness::new();
    let header = format!("{},is_fraud,fraud_probability", BASE_HEADER);
    harness.write_input(
        &header,
        &[
            // Upstream says fraud with 0.6; model says 0.8 -> keep the larger.
            "tx-a,2026-08-07 10:00:00,AC1,AC2,8000,TRANSFER,Delhi,1,0.6",
            // Upstream says fraud with 0.95; model says 0.5 -> keep 0.95.
            "tx-b,2026-08-07 10:00:01,AC1,AC2,5000,TRANSFER,Delhi,1,0.95",
            // Flag 0: the model alone decides, upstream probability ignored.
            "tx-c,2026-08-07 10:00:02,AC1,AC2,2000,TRANSFER,Delhi,0,0.99",
        ],
    );

    harness.pipeline.run_cycle().unwrap();
    let records = harness.output();

    let a = records.iter().find(|r| r.transaction_id == "tx-a").unwrap();
    assert_eq!((a.fraud_prediction, a.fraud_probability), (1, 0.8));

    let b = records.iter().find(|r| r.transaction_id == "tx-b").unwrap();
    assert_eq!((b.fraud_prediction, b.fraud_probability), (1, 0.95));

    let c = records.iter().find(|r| r.transaction_id == "tx-c").unwrap();
    assert_eq!((c.fraud_prediction, c.fraud_probability), (0, 0.2));
}

#[test]
fn primary_signal_column_beats_the_alias() {
    let harness = Harness::new();
    let header = format!("{},fraud_prediction,is_fraud", BASE_HEADER);
    // fraud_prediction=1 while is_fraud=0: the primary column must win.
    harness.write_input(
        &header,
        &["tx-p,2026-08-07 10:00:00,AC1,AC2,2000,TRANSFER,Delhi,1,0"],
    );

    harness.pipeline.run_cycle().unwrap();
    let records = harness.output();
    assert_eq!(records[0].fraud_prediction, 1);
    // No fraud_probability column: upstream probability defaults to 0, so
    // the model's own estimate survives.
    assert_eq!(records[0].fraud_probability, 0.2);
}

#[test]
fn threshold_boundary_is_inclusive() {
    let harness = Harness::new();
    harness.write_input(
        BASE_HEADER,
        &[
            "tx-at,2026-08-07 10:00:00,AC1,AC2,7500,TRANSFER,Delhi",
            "tx-below,2026-08-07 10:00:01,AC1,AC2,7499,TRANSFER,Delhi",
        ],
    );

    harness.pipeline.run_cycle().unwrap();
    let records = harness.output();

    let at = records.iter().find(|r| r.transaction_id == "tx-at").unwrap();
    assert_eq!(at.fraud_prediction, 1);

    let below = records
        .iter()
        .find(|r| r.transaction_id == "tx-below")
        .unwrap();
    assert_eq!(below.fraud_prediction, 0);
    assert_eq!(below.fraud_probability, 0.7499);
}

#[test]
fn extreme_amounts_are_dropped() {
    let harness = Harness::new();
    harness.write_input(
        BASE_HEADER,
        &[
            "tx-big,2026-08-07 10:00:00,AC1,AC2,1000000,TRANSFER,Delhi",
            "tx-ok,2026-08-07 10:00:01,AC1,AC2,999999.99,TRANSFER,Delhi",
        ],
    );

    let outcome = harness.pipeline.run_cycle().unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::Scored(CycleReport {
            new_rows: 2,
            dropped: 1,
            scored: 1,
            fraud: 1,
        })
    );

    let records = harness.output();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].transaction_id, "tx-ok");
}

#[test]
fn rows_missing_required_fields_are_never_scored() {
    let harness = Harness::new();
    harness.write_input(
        BASE_HEADER,
        &[
            // Empty location cell
            "tx-noloc,2026-08-07 10:00:00,AC1,AC2,100,UPI,",
            "tx-good,2026-08-07 10:00:01,AC1,AC2,100,UPI,Mumbai",
        ],
    );

    harness.pipeline.run_cycle().unwrap();
    // The malformed row is reconsidered next cycle and dropped again.
    let outcome = harness.pipeline.run_cycle().unwrap();
    assert_eq!(outcome, CycleOutcome::Skipped(SkipReason::AllRowsDropped));

    let records = harness.output();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].transaction_id, "tx-good");
}

#[test]
fn probabilities_are_rounded_to_four_places() {
    let harness = Harness::new();
    harness.write_input(
        BASE_HEADER,
        &["tx-r,2026-08-07 10:00:00,AC1,AC2,1234.56,TRANSFER,Delhi"],
    );

    harness.pipeline.run_cycle().unwrap();
    let records = harness.output();
    assert_eq!(records[0].fraud_probability, 0.1235);
}

#[test]
fn batches_are_appended_in_event_time_order() {
    let harness = Harness::new();
    harness.write_input(
        BASE_HEADER,
        &[
            "tx-3,2026-08-07 10:00:30,AC1,AC2,100,UPI,Mumbai",
            "tx-1,2026-08-07 10:00:10,AC1,AC2,100,UPI,Mumbai",
            "tx-2,2026-08-07 10:00:20,AC1,AC2,100,UPI,Mumbai",
        ],
    );

    harness.pipeline.run_cycle().unwrap();
    let ids: Vec<_> = harness
        .output()
        .iter()
        .map(|r| r.transaction_id.clone())
        .collect();
    assert_eq!(ids, vec!["tx-1", "tx-2", "tx-3"]);
}

#[test]
fn output_without_id_column_is_treated_as_reset() {
    let harness = Harness::new();
    fs::write(&harness.output_path, "foo,bar\n1,2\n").unwrap();
    harness.write_input(
        BASE_HEADER,
        &["tx-1,2026-08-07 10:00:00,AC1,AC2,100,UPI,Mumbai"],
    );

    let outcome = harness.pipeline.run_cycle().unwrap();
    assert!(matches!(
        outcome,
        CycleOutcome::Scored(CycleReport { scored: 1, .. })
    ));

    // The orphaned rows are left in place; the new row is appended after them.
    let content = fs::read_to_string(&harness.output_path).unwrap();
    assert!(content.starts_with("foo,bar\n1,2\n"));
    assert!(content.contains("tx-1"));
    assert_eq!(content.lines().count(), 3);
}

#[test]
fn missing_or_empty_input_skips_the_cycle() {
    let harness = Harness::new();

    let outcome = harness.pipeline.run_cycle().unwrap();
    assert_eq!(outcome, CycleOutcome::Skipped(SkipReason::InputUnavailable));

    harness.write_input(BASE_HEADER, &[]);
    let outcome = harness.pipeline.run_cycle().unwrap();
    assert_eq!(outcome, CycleOutcome::Skipped(SkipReason::InputUnavailable));
}

#[test]
fn torn_final_row_is_skipped_until_complete() {
    let harness = Harness::new();
    harness.write_input(
        BASE_HEADER,
        &[
            "tx-1,2026-08-07 10:00:00,AC1,AC2,100,UPI,Mumbai",
            // A line torn mid-append by the producer
            "tx-2,2026-08-07 10:00:05",
        ],
    );

    let outcome = harness.pipeline.run_cycle().unwrap();
    assert!(matches!(
        outcome,
        CycleOutcome::Scored(CycleReport { scored: 1, .. })
    ));

    // Next cycle the row is whole and gets scored exactly once.
    harness.write_input(
        BASE_HEADER,
        &[
            "tx-1,2026-08-07 10:00:00,AC1,AC2,100,UPI,Mumbai",
            "tx-2,2026-08-07 10:00:05,AC3,AC4,100,UPI,Mumbai",
        ],
    );
    let outcome = harness.pipeline.run_cycle().unwrap();
    assert!(matches!(
        outcome,
        CycleOutcome::Scored(CycleReport { scored: 1, .. })
    ));

    let mut ids: Vec<_> = harness
        .output()
        .iter()
        .map(|r| r.transaction_id.clone())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["tx-1", "tx-2"]);
}
