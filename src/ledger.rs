//! Ledger file I/O.
//!
//! Both ledgers are append-only CSV files. The input ledger may be appended
//! to by the external producer at any moment, including mid-read, so every
//! read path here degrades to "no data this cycle" instead of failing the
//! loop. The output ledger assumes single-writer discipline: exactly one
//! scoring loop per file.

use crate::reconcile::SignalSource;
use crate::types::{RawTransaction, ScoredRecord};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

/// One read of the input ledger: the surviving rows plus the batch-level
/// upstream signal resolution from the header.
#[derive(Debug)]
pub struct InputBatch {
    pub rows: Vec<RawTransaction>,
    pub signal: SignalSource,
}

/// Read the whole input ledger.
///
/// Returns `None` whenever there is nothing to score this cycle: the file is
/// missing, empty, or transiently unreadable while the producer touches it.
/// Individual unreadable rows (typically a line torn by a concurrent append)
/// are skipped; they come back whole on the next cycle and dedup keeps that
/// safe.
pub fn read_input(path: &Path) -> Option<InputBatch> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "Input ledger not found");
            return None;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Input ledger unreadable; retrying next cycle");
            return None;
        }
    };

    let mut reader = csv::Reader::from_reader(file);
    let signal = match reader.headers() {
        Ok(headers) => SignalSource::from_headers(headers.iter()),
        Err(e) => {
            warn!(error = %e, "Input ledger header unreadable; retrying next cycle");
            return None;
        }
    };

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for row in reader.deserialize::<RawTransaction>() {
        match row {
            Ok(tx) => rows.push(tx),
            Err(e) => {
                skipped += 1;
                debug!(error = %e, "Skipping unreadable input row");
            }
        }
    }
    if skipped > 0 {
        warn!(skipped, "Skipped unreadable input rows this cycle");
    }
    if rows.is_empty() {
        debug!(path = %path.display(), "Input ledger has no rows");
        return None;
    }

    Some(InputBatch { rows, signal })
}

/// Collect the set of transaction ids already present in the output ledger.
///
/// A missing file yields the empty set. A file whose header lacks the
/// `transaction_id` column is treated as reset: existing rows are orphaned
/// for dedup purposes but never deleted.
pub fn scored_ids(path: &Path) -> Result<HashSet<String>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to open output ledger {}", path.display()))
        }
    };

    let mut reader = csv::Reader::from_reader(file);
    let headers = reader
        .headers()
        .context("Failed to read output ledger header")?
        .clone();

    let Some(id_column) = headers.iter().position(|h| h == "transaction_id") else {
        warn!(path = %path.display(), "Output ledger lacks a transaction_id column; treating as reset");
        return Ok(HashSet::new());
    };

    let mut ids = HashSet::new();
    for record in reader.records() {
        // A torn final line from an interrupted append is not a scored row.
        let Ok(record) = record else { continue };
        if let Some(id) = record.get(id_column) {
            ids.insert(id.to_string());
        }
    }
    Ok(ids)
}

/// Append scored records to the output ledger.
///
/// The header row is written only when the file is being created (or exists
/// empty). One buffered flush per batch; atomicity across a crash mid-append
/// is best-effort.
pub fn append_scored(path: &Path, records: &[ScoredRecord]) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }

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
        .with_context(|| format!("Failed to open output ledger {}", path.display()))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(write_header)
        .from_writer(file);
    for record in records {
        writer
            .serialize(record)
            .context("Failed to serialize scored record")?;
    }
    writer.flush().context("Failed to flush output ledger")?;
    Ok(())
}
