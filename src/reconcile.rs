//! Reconciliation of classifier output with upstream fraud signals.
//!
//! An upstream flag represents ground truth or a high-confidence external
//! assertion, so it is trusted unconditionally; the model is authoritative
//! only when no such signal is present.

use crate::types::transaction::CleanTransaction;

/// Which input column carries the upstream fraud flag for a batch.
///
/// Resolved once per batch from the ledger header: the primary
/// `fraud_prediction` name wins over the `is_fraud` alias. At most one is
/// expected to be present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignalSource {
    FraudPrediction,
    IsFraud,
    #[default]
    None,
}

impl SignalSource {
    /// Resolve the signal column from an input ledger header.
    pub fn from_headers<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut has_is_fraud = false;
        for header in headers {
            if header == "fraud_prediction" {
                return SignalSource::FraudPrediction;
            }
            has_is_fraud |= header == "is_fraud";
        }
        if has_is_fraud {
            SignalSource::IsFraud
        } else {
            SignalSource::None
        }
    }
}

/// Final per-transaction decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    /// Binary fraud decision, always 0 or 1
    pub prediction: i32,
    /// Probability in [0, 1], rounded to 4 decimal places
    pub probability: f64,
}

/// Combines model probabilities with upstream signals under a fixed threshold.
#[derive(Debug, Clone)]
pub struct Reconciler {
    threshold: f64,
}

impl Reconciler {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Produce the final verdict for one transaction.
    ///
    /// A flagged row is fraud regardless of the model, and its probability
    /// is the larger of the upstream and model estimates. Everything else
    /// is decided by the model against the threshold.
    pub fn reconcile(&self, tx: &CleanTransaction, model_prob: f64, source: SignalSource) -> Verdict {
        let flag_cell = match source {
            SignalSource::FraudPrediction => tx.fraud_prediction.as_deref(),
            SignalSource::IsFraud => tx.is_fraud.as_deref(),
            SignalSource::None => None,
        };

        if coerce_flag(flag_cell) {
            let upstream = coerce_probability(tx.fraud_probability.as_deref());
            Verdict {
                prediction: 1,
                probability: round4(upstream.max(model_prob)),
            }
        } else {
            Verdict {
                prediction: i32::from(model_prob >= self.threshold),
                probability: round4(model_prob),
            }
        }
    }
}

/// Numeric coercion of a flag cell; empty or unparseable counts as 0.
fn coerce_flag(raw: Option<&str>) -> bool {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .map(|v| v.trunc() as i64 == 1)
        .unwrap_or(false)
}

fn coerce_probability(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Round to 4 decimal places, half away from zero.
pub fn round4(p: f64) -> f64 {
    (p * 10_000.0).round() / 10_000.0
}
