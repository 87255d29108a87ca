//! Scored output records

use crate::reconcile::Verdict;
use crate::types::transaction::CleanTransaction;
use crate::types::TIMESTAMP_FORMAT;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One immutable row of the output ledger.
///
/// Field order is the ledger column order. Once appended, a record is never
/// revisited or re-scored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub transaction_id: String,

    /// Event time, normalized to the wire format
    pub timestamp: String,

    /// Wall-clock time the batch was scored
    pub processed_time: String,

    pub sender_account: String,
    pub receiver_account: String,
    pub amount: f64,
    pub transaction_type: String,
    pub location: String,

    /// Final binary decision, always 0 or 1
    pub fraud_prediction: i32,

    /// Final probability, rounded to 4 decimal places
    pub fraud_probability: f64,
}

impl ScoredRecord {
    /// Build an output row from a scored transaction.
    pub fn new(
        tx: &CleanTransaction,
        event_time: NaiveDateTime,
        processed_at: DateTime<Utc>,
        verdict: &Verdict,
    ) -> Self {
        Self {
            transaction_id: tx.transaction_id.clone(),
            timestamp: event_time.format(TIMESTAMP_FORMAT).to_string(),
            processed_time: processed_at.format(TIMESTAMP_FORMAT).to_string(),
            sender_account: tx.sender_account.clone(),
            receiver_account: tx.receiver_account.clone(),
            amount: tx.amount,
            transaction_type: tx.transaction_type.clone(),
            location: tx.location.clone(),
            fraud_prediction: verdict.prediction,
            fraud_probability: verdict.probability,
        }
    }
}
