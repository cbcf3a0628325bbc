//! Error types for diglab-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in diglab-core
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file or create a directory
    #[error("failed to write '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Record table is structurally invalid
    #[error("invalid record table '{path}': {message}")]
    CsvParse { path: PathBuf, message: String },

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// JSON record export could not be interpreted
    #[error("invalid record export '{path}': {message}")]
    RecordParse { path: PathBuf, message: String },

    /// JSON file could not be parsed
    #[error("invalid JSON in '{path}': {source}")]
    JsonFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Record set is empty
    #[error("no records found in '{0}'")]
    NoRecords(PathBuf),

    /// A record lacks a field required by a template
    #[error("record is missing required field '{0}'")]
    MissingField(String),

    /// Subject or session identifier cannot be used in a BIDS path
    #[error("invalid {entity} identifier '{value}': only alphanumeric characters are allowed")]
    InvalidIdentifier { entity: &'static str, value: String },

    /// Record does not belong to the session it is used for
    #[error("record subject '{found}' does not match session subject '{expected}'")]
    SubjectMismatch { expected: String, found: String },

    /// Subject/session pair seen twice in one conversion run
    #[error("duplicate session sub-{subject}/ses-{session}")]
    DuplicateSession { subject: String, session: String },

    /// Unknown file creation mode
    #[error("invalid file creation mode \"{0}\"")]
    InvalidMode(String),

    /// Metadata file name is not allowed at the directory level it is written to
    #[error("metadata file '{file}' is not authorized at level {level}")]
    UnauthorizedMetadata { file: String, level: String },

    /// Data file registered for organization does not exist
    #[error("data file not found: {0}")]
    DataFileNotFound(PathBuf),

    /// One source file would be moved into several sessions
    #[error("data file '{0}' is shared by several sessions and cannot be moved")]
    SharedMoveSource(PathBuf),

    /// Output root is missing
    #[error("directory does not exist: {0}")]
    MissingDirectory(PathBuf),

    /// Project not listed in the configuration file
    #[error("project '{0}' not found in configuration")]
    ProjectNotFound(String),

    /// Directory traversal error
    #[error("failed to traverse directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV/TSV writer error
    #[error("TSV error: {0}")]
    Tsv(#[from] csv::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
