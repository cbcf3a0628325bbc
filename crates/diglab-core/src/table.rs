//! Tab-separated sidecar tables and JSON sidecar files

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Value written for missing cells
pub const NOT_AVAILABLE: &str = "n/a";

/// A sidecar table with a fixed column layout
#[derive(Debug, Clone, PartialEq)]
pub struct TsvTable {
    /// Column names, in file order
    pub columns: Vec<String>,
    /// Row data, one cell per column
    pub rows: Vec<Vec<String>>,
}

impl TsvTable {
    /// Create an empty table with the given columns
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a table from serializable rows; the header is always written,
    /// even when `rows` is empty
    pub fn from_records<T: Serialize>(columns: &[&str], rows: &[T]) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        for row in rows {
            writer.serialize(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))?;

        let mut table = Self::new(columns);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(bytes.as_slice());
        for record in reader.records() {
            table.push_row(record?.iter().map(str::to_string).collect());
        }
        Ok(table)
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Index of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Append a row, padding short rows with `n/a` and truncating long ones
    pub fn push_row(&mut self, mut row: Vec<String>) {
        if row.len() > self.columns.len() {
            tracing::warn!(
                cells = row.len(),
                columns = self.columns.len(),
                "row has more cells than columns, truncating"
            );
        }
        row.resize(self.columns.len(), NOT_AVAILABLE.to_string());
        self.rows.push(row);
    }

    /// Append a row unless a row with the same first cell exists.
    /// Returns whether the row was added.
    pub fn push_unique(&mut self, row: Vec<String>) -> bool {
        let key = row.first().cloned().unwrap_or_default();
        if self.rows.iter().any(|r| r.first() == Some(&key)) {
            return false;
        }
        self.push_row(row);
        true
    }

    /// Load a table written by [`TsvTable::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_reader(BufReader::new(file));

        let csv_err = |e| Error::Csv {
            path: path.to_path_buf(),
            source: e,
        };
        let headers = reader.headers().map_err(csv_err)?.clone();
        let mut table = Self {
            columns: headers.iter().map(str::to_string).collect(),
            rows: Vec::new(),
        };
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            table.push_row(record.iter().map(str::to_string).collect());
        }
        Ok(table)
    }

    /// Load the table at `path` if it exists with the same columns,
    /// otherwise start an empty one
    pub fn load_or_new<P: AsRef<Path>>(path: P, columns: &[&str]) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new(columns));
        }
        let existing = Self::load(path)?;
        if existing.columns.iter().map(String::as_str).eq(columns.iter().copied()) {
            Ok(existing)
        } else {
            tracing::warn!(path = %path.display(), "existing table has a different layout, replacing it");
            Ok(Self::new(columns))
        }
    }

    /// Write the table as TSV
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(BufWriter::new(file));
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Write a value as pretty-printed JSON
pub fn save_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Read a JSON file written by [`save_json`]
pub fn load_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| Error::JsonFile {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Serialize)]
    struct Probe {
        probe_id: String,
        x: f64,
    }

    #[test]
    fn test_push_row_pads_and_truncates() {
        let mut table = TsvTable::new(&["a", "b"]);
        table.push_row(vec!["1".into()]);
        table.push_row(vec!["1".into(), "2".into(), "3".into()]);
        assert_eq!(table.rows[0], vec!["1", "n/a"]);
        assert_eq!(table.rows[1], vec!["1", "2"]);
    }

    #[test]
    fn test_push_unique() {
        let mut table = TsvTable::new(&["participant_id"]);
        assert!(table.push_unique(vec!["sub-01".into()]));
        assert!(!table.push_unique(vec!["sub-01".into()]));
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn test_from_records() {
        let rows = vec![Probe {
            probe_id: "e380a".into(),
            x: 1.5,
        }];
        let table = TsvTable::from_records(&["probe_id", "x"], &rows).unwrap();
        assert_eq!(table.rows, vec![vec!["e380a".to_string(), "1.5".to_string()]]);

        let empty = TsvTable::from_records::<Probe>(&["probe_id", "x"], &[]).unwrap();
        assert_eq!(empty.columns, vec!["probe_id", "x"]);
        assert_eq!(empty.row_count(), 0);
    }

    #[test]
    fn test_save_writes_header_only_table() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("channels.tsv");
        TsvTable::new(&["channel_id", "contact_id"]).save(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "channel_id\tcontact_id\n");
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sessions.tsv");
        let mut table = TsvTable::new(&["session_id", "acq_time"]);
        table.push_row(vec!["ses-01".into(), "2021-01-01T00:00:00".into()]);
        table.save(&path).unwrap();

        let loaded = TsvTable::load(&path).unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn test_load_or_new_replaces_other_layout() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sessions.tsv");
        TsvTable::new(&["old"]).save(&path).unwrap();

        let table = TsvTable::load_or_new(&path, &["session_id"]).unwrap();
        assert_eq!(table.columns, vec!["session_id"]);
    }
}
