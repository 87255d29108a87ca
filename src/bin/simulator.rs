//! Synthetic Transaction Producer
//!
//! Appends batches of simulated transactions to the input ledger so the
//! scoring pipeline can be exercised end to end. A small, time-of-day
//! dependent share of rows carries an upstream fraud flag with a high
//! probability attached.

use anyhow::{Context, Result};
use chrono::{Local, Timelike};
use rand::Rng;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::time::Duration;
use tracing::info;

const TRANSACTION_TYPES: &[&str] = &[
    "PURCHASE",
    "WITHDRAWAL",
    "DEPOSIT",
    "TRANSFER",
    "UPI",
    "IMPS",
    "NEFT",
    "RTGS",
];

const LOCATIONS: &[&str] = &[
    "Mumbai",
    "Delhi",
    "Bangalore",
    "Hyderabad",
    "Chennai",
    "Kolkata",
    "Pune",
    "Ahmedabad",
    "Andra Pradesh",
    "Tamil Nadu",
    "Kerala",
];

/// Row layout matching the input ledger contract
#[derive(Debug, Serialize)]
struct SimulatedTransaction {
    transaction_id: String,
    timestamp: String,
    processed_time: String,
    sender_account: String,
    receiver_account: String,
    amount: f64,
    transaction_type: String,
    location: String,
    is_fraud: i32,
    fraud_probability: f64,
}

/// Transaction generator with a fluctuating fraud rate
struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
}

impl TransactionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    fn generate(&mut self, force_fraud: bool) -> SimulatedTransaction {
        let now = Local::now();
        let transaction_type = self.random_choice(TRANSACTION_TYPES).to_string();
        let location = self.random_choice(LOCATIONS).to_string();
        let pattern_rate = self.fraud_rate(now.hour(), &transaction_type, &location);

        let base_fraud_chance = 0.007 * self.rng.gen_range(0.8..1.2);
        let is_fraud =
            force_fraud || self.rng.gen_bool(base_fraud_chance) || self.rng.gen_bool(pattern_rate);

        let (fraud_probability, amount) = if is_fraud {
            // Fraudulent transactions carry a high upstream probability and
            // skew toward unusual amounts.
            (
                round2(self.rng.gen_range(0.85..0.99)),
                round2(self.exponential(15_000.0) + 1_000.0),
            )
        } else {
            (
                round2(self.rng.gen_range(0.01..0.30)),
                round2(self.exponential(8_000.0) + 500.0),
            )
        };

        let stamp = now.format("%Y-%m-%d %H:%M:%S").to_string();
        SimulatedTransaction {
            transaction_id: uuid::Uuid::new_v4().to_string(),
            timestamp: stamp.clone(),
            processed_time: stamp,
            sender_account: format!("AC{}", self.rng.gen_range(100_000..1_000_000)),
            receiver_account: format!("AC{}", self.rng.gen_range(100_000..1_000_000)),
            amount,
            transaction_type,
            location,
            is_fraud: i32::from(is_fraud),
            fraud_probability,
        }
    }

    /// Pattern-based fraud rate: night hours and a few known hot
    /// type/location combinations run higher, capped at 10%.
    fn fraud_rate(&self, hour: u32, transaction_type: &str, location: &str) -> f64 {
        let mut rate = match hour {
            0..=5 => 0.03,
            6..=11 => 0.01,
            12..=17 => 0.015,
            _ => 0.02,
        };

        if transaction_type == "UPI" && location == "Mumbai" {
            rate += 0.02;
        } else if transaction_type == "WITHDRAWAL" && location == "Delhi" {
            rate += 0.01;
        } else if location == "Kolkata" {
            rate += 0.008;
        }

        rate.min(0.10)
    }

    /// Sample from an exponential distribution via inverse CDF.
    fn exponential(&mut self, scale: f64) -> f64 {
        let u: f64 = self.rng.gen_range(0.0..1.0);
        -scale * (1.0 - u).ln()
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Append a batch, writing the header only when creating the file.
fn append_batch(path: &Path, batch: &[SimulatedTransaction]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let write_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(write_header)
        .from_writer(file);
    for tx in batch {
        writer.serialize(tx)?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("simulator=info".parse()?),
        )
        .init();

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let output_path = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("data/realtime_stream.csv");
    // 0 means run forever
    let max_batches: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(0);

    info!(
        output = %output_path,
        max_batches,
        "Starting transaction simulator"
    );

    let path = Path::new(output_path);
    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();

    let mut batch_counter: u64 = 0;
    let mut total: u64 = 0;
    let mut total_fraud: u64 = 0;
    // Inject a guaranteed fraud every so often to keep the rate visible.
    let mut next_forced_batch = rng.gen_range(40..80);

    loop {
        batch_counter += 1;
        let force_fraud_batch = batch_counter >= next_forced_batch;
        if force_fraud_batch {
            next_forced_batch = batch_counter + rng.gen_range(40..80);
        }

        let batch_size = rng.gen_range(3..=10);
        let batch: Vec<SimulatedTransaction> = (0..batch_size)
            .map(|i| generator.generate(force_fraud_batch && i == 0))
            .collect();

        append_batch(path, &batch)?;

        let fraud = batch.iter().filter(|tx| tx.is_fraud == 1).count() as u64;
        total += batch.len() as u64;
        total_fraud += fraud;
        info!(
            batch = batch_counter,
            rows = batch.len(),
            fraud,
            total,
            total_fraud,
            "Appended batch"
        );

        if max_batches > 0 && batch_counter >= max_batches {
            break;
        }
        std::thread::sleep(Duration::from_millis(rng.gen_range(500..2000)));
    }

    info!(total, total_fraud, "Simulator finished");
    Ok(())
}
