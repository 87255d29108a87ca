//! Performance metrics and statistics tracking for the scoring loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for the scoring pipeline
pub struct PipelineMetrics {
    /// Total scoring cycles completed (scored or skipped)
    pub cycles_completed: AtomicU64,
    /// Total transactions scored and appended
    pub transactions_scored: AtomicU64,
    /// Total rows dropped by validation or encoding
    pub rows_dropped: AtomicU64,
    /// Total transactions with a final fraud verdict
    pub frauds_flagged: AtomicU64,
    /// Cycle durations (in microseconds)
    cycle_times: RwLock<Vec<u64>>,
    /// Final probability distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            cycles_completed: AtomicU64::new(0),
            transactions_scored: AtomicU64::new(0),
            rows_dropped: AtomicU64::new(0),
            frauds_flagged: AtomicU64::new(0),
            cycle_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a completed cycle
    pub fn record_cycle(&self, elapsed: Duration) {
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.cycle_times.write() {
            times.push(elapsed.as_micros() as u64);
            // Keep only recent samples for memory efficiency
            if times.len() > 10_000 {
                times.drain(0..5_000);
            }
        }
    }

    /// Record the outcome of a scoring batch
    pub fn record_batch(&self, scored: usize, dropped: usize, fraud: usize) {
        self.transactions_scored
            .fetch_add(scored as u64, Ordering::Relaxed);
        self.rows_dropped.fetch_add(dropped as u64, Ordering::Relaxed);
        self.frauds_flagged
            .fetch_add(fraud as u64, Ordering::Relaxed);
    }

    /// Record a final probability into the distribution histogram
    pub fn record_score(&self, probability: f64) {
        let bucket = (probability * 10.0).clamp(0.0, 9.0) as usize;
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Get cycle duration statistics
    pub fn get_cycle_stats(&self) -> CycleStats {
        let times = match self.cycle_times.read() {
            Ok(times) => times,
            Err(_) => return CycleStats::default(),
        };
        if times.is_empty() {
            return CycleStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        CycleStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Get current throughput (scored transactions per second since start)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.transactions_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get the final probability distribution
    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let cycles = self.cycles_completed.load(Ordering::Relaxed);
        let scored = self.transactions_scored.load(Ordering::Relaxed);
        let dropped = self.rows_dropped.load(Ordering::Relaxed);
        let fraud = self.frauds_flagged.load(Ordering::Relaxed);
        let fraud_rate = if scored > 0 {
            (fraud as f64 / scored as f64) * 100.0
        } else {
            0.0
        };

        let stats = self.get_cycle_stats();
        let throughput = self.get_throughput();
        let score_dist = self.get_score_distribution();

        info!("=== scoring pipeline summary ===");
        info!(
            "cycles: {}  scored: {}  dropped: {}  fraud: {} ({:.2}%)",
            cycles, scored, dropped, fraud, fraud_rate
        );
        info!(
            "cycle time (us): mean={} p50={} p95={} p99={} max={}",
            stats.mean_us, stats.p50_us, stats.p95_us, stats.p99_us, stats.max_us
        );
        info!("throughput: {:.1} tx/s", throughput);

        let total: u64 = score_dist.iter().sum();
        if total > 0 {
            info!("probability distribution:");
            for (i, &count) in score_dist.iter().enumerate() {
                let pct = (count as f64 / total as f64) * 100.0;
                let bar: String = "#".repeat(((pct / 2.0) as usize).min(40));
                info!(
                    "  {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                    i as f64 / 10.0,
                    (i + 1) as f64 / 10.0,
                    count,
                    pct,
                    bar
                );
            }
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Cycle duration statistics
#[derive(Debug, Default)]
pub struct CycleStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodic reporter that prints the metrics summary on a fixed interval
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
