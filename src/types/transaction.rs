//! Transaction record types and row validation

use serde::Deserialize;
use std::fmt;

/// Guard against corrupt or adversarial amounts; rows at or above this are dropped.
pub const MAX_AMOUNT: f64 = 1_000_000.0;

/// A raw row of the input ledger.
///
/// Every field is optional at parse time: the producer appends concurrently
/// and rows can arrive incomplete or malformed, so reading never fails at
/// the row level. Validation decides what survives.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub transaction_id: Option<String>,

    /// Event time in the ledger wire format
    #[serde(default)]
    pub timestamp: Option<String>,

    #[serde(default)]
    pub sender_account: Option<String>,

    #[serde(default)]
    pub receiver_account: Option<String>,

    /// Raw amount cell; coerced to numeric during validation
    #[serde(default)]
    pub amount: Option<String>,

    #[serde(default)]
    pub transaction_type: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    /// Upstream fraud flag under its alias name
    #[serde(default)]
    pub is_fraud: Option<String>,

    /// Upstream fraud flag under its primary name
    #[serde(default)]
    pub fraud_prediction: Option<String>,

    /// Upstream fraud probability, if the producer attached one
    #[serde(default)]
    pub fraud_probability: Option<String>,
}

/// Why a row was excluded from a cycle's output batch.
///
/// Drops are observability signals, not errors; the cycle proceeds with the
/// remaining rows, and a dropped row is reconsidered on every later cycle
/// for as long as it stays in the input ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MissingField(&'static str),
    UnparseableAmount,
    ExtremeAmount,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::MissingField(name) => write!(f, "missing required field '{}'", name),
            DropReason::UnparseableAmount => write!(f, "amount is not numeric"),
            DropReason::ExtremeAmount => write!(f, "amount outside [0, {})", MAX_AMOUNT),
        }
    }
}

/// A validated transaction ready for encoding and scoring.
#[derive(Debug, Clone)]
pub struct CleanTransaction {
    pub transaction_id: String,
    /// Event time, still in wire format; the encoder parses it
    pub timestamp: String,
    pub sender_account: String,
    pub receiver_account: String,
    pub amount: f64,
    pub transaction_type: String,
    pub location: String,
    pub is_fraud: Option<String>,
    pub fraud_prediction: Option<String>,
    pub fraud_probability: Option<String>,
}

impl RawTransaction {
    /// Validate and clean a raw row.
    ///
    /// Requires all seven core fields; the upstream signal fields stay
    /// optional and are carried through untouched for reconciliation.
    pub fn validate(self) -> Result<CleanTransaction, DropReason> {
        fn require(field: Option<String>, name: &'static str) -> Result<String, DropReason> {
            field.ok_or(DropReason::MissingField(name))
        }

        let transaction_id = require(self.transaction_id, "transaction_id")?;
        let timestamp = require(self.timestamp, "timestamp")?;
        let sender_account = require(self.sender_account, "sender_account")?;
        let receiver_account = require(self.receiver_account, "receiver_account")?;
        let raw_amount = require(self.amount, "amount")?;
        let transaction_type = require(self.transaction_type, "transaction_type")?;
        let location = require(self.location, "location")?;

        let amount: f64 = raw_amount
            .trim()
            .parse()
            .map_err(|_| DropReason::UnparseableAmount)?;
        if !amount.is_finite() {
            return Err(DropReason::UnparseableAmount);
        }
        // Negative amounts violate the producer contract and would poison
        // the log-amount transform downstream.
        if amount < 0.0 || amount >= MAX_AMOUNT {
            return Err(DropReason::ExtremeAmount);
        }

        Ok(CleanTransaction {
            transaction_id,
            timestamp,
            sender_account,
            receiver_account,
            amount,
            transaction_type,
            location,
            is_fraud: self.is_fraud,
            fraud_prediction: self.fraud_prediction,
            fraud_probability: self.fraud_probability,
        })
    }
}
