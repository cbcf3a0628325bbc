//! diglab-core: Core library for building BIDS ephys datasets from session records
//!
//! This library provides functionality to:
//! - Read session records from CSV tables or REDCap JSON exports
//! - Derive subject/session identifiers and the `sub-/ses-/ephys` layout
//! - Copy, link or move data files into place
//! - Write the sidecar metadata files (participants, sessions, probes, ...)
//! - Check sidecar names against the per-level naming rules

pub mod config;
pub mod convert;
pub mod error;
pub mod layout;
pub mod parser;
pub mod record;
pub mod rules;
pub mod table;
pub mod templates;

pub use config::{ConfigFile, Hardware, ProjectConfig};
pub use convert::{convert_project, convert_records, generate_from_csv, ConversionReport, ConvertOptions};
pub use error::{Error, Result};
pub use layout::{collect_data_files, create_file, BidsSession, CreationMode, DataKey};
pub use parser::{read_csv_records, read_json_records};
pub use record::{SessionIds, SessionRecord};
pub use rules::{Level, Rule, RULES_SET};
pub use table::TsvTable;
pub use templates::{MetadataFile, MetadataWriter, Profile};
