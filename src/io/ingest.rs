//! Ledger ingest.
//!
//! Turns a JSON array of objects or a headed CSV file into raw `Record` rows.
//! No typing happens here: dates and amounts stay as the strings/numbers the
//! source held, and the series builder decides what is usable.
//!
//! - CSV header names are trimmed; empty cells are left out of the row
//! - JSON input must be an array whose elements are all objects
//! - the format is chosen by file extension (`.json`, `.csv`)

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use crate::domain::Record;
use crate::error::AppError;

/// Load rows from `path`, dispatching on its extension.
pub fn load_records(path: &Path) -> Result<Vec<Record>, AppError> {
    let file = File::open(path).map_err(|e| AppError::Io(format!("Failed to open '{}': {e}", path.display())))?;
    let reader = BufReader::new(file);

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let records = match extension.as_str() {
        "json" => records_from_json_reader(reader)?,
        "csv" => records_from_csv_reader(reader)?,
        other => {
            return Err(AppError::malformed(format!(
                "Unsupported input format '{other}' for '{}' (expected .json or .csv)",
                path.display()
            )));
        }
    };

    info!(path = %path.display(), rows = records.len(), "ledger loaded");
    Ok(records)
}

pub fn records_from_json_reader<R: Read>(reader: R) -> Result<Vec<Record>, AppError> {
    let value: Value = serde_json::from_reader(reader)?;
    let Value::Array(items) = value else {
        return Err(AppError::malformed("JSON input must be an array of objects"));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(map) => Ok(map),
            _ => Err(AppError::malformed(format!("JSON element {i} is not an object"))),
        })
        .collect()
}

pub fn records_from_csv_reader<R: Read>(reader: R) -> Result<Vec<Record>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    if headers.iter().all(String::is_empty) {
        return Err(AppError::malformed("CSV input has no header row"));
    }

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row?;
        if row.len() > headers.len() {
            debug!(line = line + 2, cells = row.len(), "extra cells beyond the header ignored");
        }
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .filter(|(name, cell)| !name.is_empty() && !cell.is_empty())
            .map(|(name, cell)| (name.clone(), Value::String(cell.to_string())))
            .collect();
        if !record.is_empty() {
            records.push(record);
        }
    }
    Ok(records)
}

/// Fail when no row carries one of `fields`.
pub fn ensure_fields_present(records: &[Record], fields: &[&str]) -> Result<(), AppError> {
    if records.is_empty() {
        return Ok(());
    }
    let missing: Vec<&str> = fields
        .iter()
        .copied()
        .filter(|f| !records.iter().any(|r| r.contains_key(*f)))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::malformed(format!(
            "Input rows lack required field(s): {}",
            missing.join(", ")
        )))
    }
}
