//! Report and ledger exports.
//!
//! The JSON report mirrors `AnalysisReport` field for field; the CSV ledger
//! uses a fixed column list so it can be read back by `ingest`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::Value;

use crate::domain::{AnalysisReport, Record};
use crate::error::AppError;

/// Write `report` as pretty-printed JSON.
pub fn write_report_json(path: &Path, report: &AnalysisReport) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::Io(format!("Failed to create report JSON '{}': {e}", path.display())))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer
        .write_all(b"\n")
        .and_then(|_| writer.flush())
        .map_err(|e| AppError::Io(format!("Failed to write report JSON: {e}")))?;
    Ok(())
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Write `records` as CSV with `columns` as the header; absent fields are empty cells.
pub fn write_records_csv(path: &Path, records: &[Record], columns: &[&str]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(columns)?;
    for record in records {
        writer.write_record(columns.iter().map(|c| cell(record.get(*c))))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::Io(format!("Failed to write CSV '{}': {e}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::{LEDGER_COLUMNS, SampleConfig, generate_ledger};
    use crate::io::ingest::load_records;

    #[test]
    fn sample_ledger_survives_csv_export() {
        let dir = std::env::temp_dir().join("finstat-export-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ledger.csv");

        let rows = generate_ledger(&SampleConfig {
            months: 3,
            ..SampleConfig::default()
        })
        .unwrap();
        write_records_csv(&path, &rows, &LEDGER_COLUMNS).unwrap();

        let back = load_records(&path).unwrap();
        assert_eq!(back.len(), rows.len());
        assert_eq!(back[0]["account_name"], "Product Revenue");
        assert_eq!(back[0]["formuladate"], "2021-02-05");
        let amount: f64 = back[0]["amount"].as_str().unwrap().parse().unwrap();
        assert!((amount - rows[0]["amount"].as_f64().unwrap()).abs() < 1e-9);
    }
}
