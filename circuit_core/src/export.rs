//! CSV export of the session history.
//!
//! Rows are appended to an existing file; sessions already present (by id)
//! are skipped so repeated exports never duplicate rows.

use crate::{Error, Result, SessionRecord};
use chrono::{DateTime, Utc};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::Path;
use uuid::Uuid;

/// A row in the CSV output
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    id: String,
    timestamp: String,
    perceived_exertion: u8,
    calories_burned: u32,
    duration_seconds: u32,
}

impl From<&SessionRecord> for CsvRow {
    fn from(record: &SessionRecord) -> Self {
        CsvRow {
            id: record.id.to_string(),
            timestamp: record.timestamp.to_rfc3339(),
            perceived_exertion: record.perceived_exertion,
            calories_burned: record.calories_burned,
            duration_seconds: record.duration_seconds,
        }
    }
}

impl TryFrom<CsvRow> for SessionRecord {
    type Error = Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id).map_err(|e| Error::Other(format!("Invalid UUID: {}", e)))?;

        let timestamp = DateTime::parse_from_rfc3339(&row.timestamp)
            .map_err(|e| Error::Other(format!("Invalid date: {}", e)))?
            .with_timezone(&Utc);

        Ok(SessionRecord {
            id,
            timestamp,
            perceived_exertion: row.perceived_exertion,
            calories_burned: row.calories_burned,
            duration_seconds: row.duration_seconds,
        })
    }
}

/// Append history to a CSV file, writing headers only for a new file
///
/// Returns the number of rows written.
pub fn write_history_csv(history: &[SessionRecord], csv_path: &Path) -> Result<usize> {
    let existing: HashSet<Uuid> = if csv_path.exists() {
        read_history_csv(csv_path)?.into_iter().map(|r| r.id).collect()
    } else {
        HashSet::new()
    };

    let pending: Vec<&SessionRecord> = history
        .iter()
        .filter(|r| !existing.contains(&r.id))
        .collect();

    if pending.is_empty() {
        tracing::info!("No new sessions to export");
        return Ok(0);
    }

    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;

    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);

    for record in &pending {
        writer.serialize(CsvRow::from(*record))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.sync_all()?;

    tracing::info!("Exported {} sessions to {:?}", pending.len(), csv_path);
    Ok(pending.len())
}

/// Read sessions back from an exported CSV, skipping malformed rows
pub fn read_history_csv(csv_path: &Path) -> Result<Vec<SessionRecord>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(csv_path)?;

    let mut records = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        match result {
            Ok(row) => match SessionRecord::try_from(row) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Failed to parse CSV row: {}", e),
            },
            Err(e) => tracing::warn!("Failed to deserialize CSV row: {}", e),
        }
    }

    Ok(records)
}
