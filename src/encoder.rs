//! Feature encoding for classifier inference.
//!
//! Reproduces the preprocessing applied at training time: time
//! decomposition, log-amount transform, and drop-first one-hot expansion of
//! the categorical fields. Alignment to the classifier's declared vocabulary
//! happens last so the model always sees its training column order.

use crate::types::transaction::CleanTransaction;
use crate::types::TIMESTAMP_FORMAT;
use chrono::{Datelike, NaiveDateTime, Timelike};
use std::collections::HashMap;
use std::fmt;

/// Error produced when a row cannot be encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    BadTimestamp(String),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::BadTimestamp(raw) => write!(f, "unparseable timestamp '{}'", raw),
        }
    }
}

impl std::error::Error for EncodeError {}

/// One encoded row: the parsed event time plus named feature columns.
#[derive(Debug, Clone)]
pub struct EncodedRow {
    pub event_time: NaiveDateTime,
    columns: HashMap<String, f32>,
}

impl EncodedRow {
    /// Value of a named feature column, if the row produced it.
    pub fn feature(&self, name: &str) -> Option<f32> {
        self.columns.get(name).copied()
    }
}

/// Encoder that turns validated transactions into model input features.
pub struct FeatureEncoder;

impl FeatureEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Parse an event timestamp in the ledger wire format.
    ///
    /// Accepts the space-separated format the producer writes and the
    /// `T`-separated ISO variant.
    pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, EncodeError> {
        let trimmed = raw.trim();
        NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S"))
            .map_err(|_| EncodeError::BadTimestamp(raw.to_string()))
    }

    /// Encode one validated transaction into named feature columns.
    ///
    /// Indicator columns follow the `{field}_{category}` naming used at
    /// training time. Monday is day 0, matching the training convention.
    pub fn encode(&self, tx: &CleanTransaction) -> Result<EncodedRow, EncodeError> {
        let event_time = Self::parse_timestamp(&tx.timestamp)?;

        let mut columns = HashMap::new();
        columns.insert("amount".to_string(), tx.amount as f32);
        columns.insert("hour".to_string(), event_time.hour() as f32);
        columns.insert(
            "day_of_week".to_string(),
            event_time.weekday().num_days_from_monday() as f32,
        );
        columns.insert("amount_log".to_string(), (1.0 + tx.amount).ln() as f32);
        columns.insert(format!("transaction_type_{}", tx.transaction_type), 1.0);
        columns.insert(format!("location_{}", tx.location), 1.0);

        Ok(EncodedRow {
            event_time,
            columns,
        })
    }

    /// Align an encoded row to the classifier's ordered vocabulary.
    ///
    /// Declared features absent from the row come out as 0; this is also
    /// what realizes drop-first one-hot, since a baseline category has no
    /// column in the vocabulary at all. Columns the classifier does not
    /// declare are dropped.
    pub fn align(&self, row: &EncodedRow, vocabulary: &[String]) -> Vec<f32> {
        vocabulary
            .iter()
            .map(|name| row.columns.get(name).copied().unwrap_or(0.0))
            .collect()
    }
}

impl Default for FeatureEncoder {
    fn default() -> Self {
        Self::new()
    }
}
