//! Readers for session record tables (CSV) and REDCap record exports (JSON)

use crate::error::{Error, Result};
use crate::record::{SessionRecord, ESSENTIAL_COLUMNS};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Parse a CSV record table.
///
/// Every cell must be filled and the header must contain the essential
/// `sub_id` and `ses_id` columns.
pub fn read_csv_records<P: AsRef<Path>>(path: P) -> Result<Vec<SessionRecord>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_csv_records(BufReader::new(file), path)
}

/// Parse a CSV record table from a string (useful for testing)
pub fn parse_csv_str(content: &str, source_name: &str) -> Result<Vec<SessionRecord>> {
    parse_csv_records(content.as_bytes(), Path::new(source_name))
}

fn parse_csv_records<R: Read>(reader: R, path: &Path) -> Result<Vec<SessionRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // Ragged rows are reported below, not by the csv crate
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(|e| Error::Csv {
            path: path.to_path_buf(),
            source: e,
        })?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let missing: Vec<&str> = ESSENTIAL_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == col))
        .collect();
    if !missing.is_empty() {
        return Err(Error::CsvParse {
            path: path.to_path_buf(),
            message: format!(
                "missing required column(s) {}; required columns are {}",
                missing.join(", "),
                ESSENTIAL_COLUMNS.join(", ")
            ),
        });
    }

    let mut records = Vec::new();
    for (row_idx, result) in csv_reader.records().enumerate() {
        let row = result.map_err(|e| Error::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;

        if row.len() > headers.len() {
            return Err(Error::CsvParse {
                path: path.to_path_buf(),
                message: format!(
                    "row {} has {} cells but the header has {} columns",
                    row_idx + 1,
                    row.len(),
                    headers.len()
                ),
            });
        }
        if row.len() < headers.len() || row.iter().any(|cell| cell.trim().is_empty()) {
            return Err(Error::CsvParse {
                path: path.to_path_buf(),
                message: format!("row {} contains empty cells", row_idx + 1),
            });
        }

        let record: SessionRecord = headers
            .iter()
            .zip(row.iter())
            .map(|(name, cell)| (name.as_str(), cell.trim()))
            .collect();
        records.push(record);
    }

    tracing::debug!(path = %path.display(), rows = records.len(), "parsed record table");
    Ok(records)
}

/// Parse a REDCap JSON record export (an array of flat objects)
pub fn read_json_records<P: AsRef<Path>>(path: P) -> Result<Vec<SessionRecord>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_json_records(&content, path)
}

/// Parse a REDCap JSON record export from a string (useful for testing)
pub fn parse_json_str(content: &str, source_name: &str) -> Result<Vec<SessionRecord>> {
    parse_json_records(content, Path::new(source_name))
}

fn parse_json_records(content: &str, path: &Path) -> Result<Vec<SessionRecord>> {
    let invalid = |message: String| Error::RecordParse {
        path: path.to_path_buf(),
        message,
    };

    let value: Value = serde_json::from_str(content).map_err(|e| Error::JsonFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    let Value::Array(items) = value else {
        return Err(invalid("expected an array of records".to_string()));
    };
    if items.is_empty() {
        return Err(Error::NoRecords(PathBuf::from(path)));
    }

    let mut records = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        let Value::Object(object) = item else {
            return Err(invalid(format!("record {idx} is not an object")));
        };

        let mut record = SessionRecord::new();
        for (name, value) in object {
            let text = match value {
                Value::Null => String::new(),
                Value::String(s) => s,
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(invalid(format!(
                        "field '{name}' of record {idx} is not a scalar"
                    )));
                }
            };
            record.insert(name, text);
        }
        records.push(record);
    }

    tracing::debug!(path = %path.display(), records = records.len(), "parsed record export");
    Ok(records)
}
