//! Project configuration
//!
//! A configuration file maps project names to their settings:
//!
//! ```json
//! {
//!   "SimpleProject": {
//!     "project_definition": "projects/simple",
//!     "output_directory": "bids/simple"
//!   }
//! }
//! ```

use crate::error::{Error, Result};
use crate::layout::CreationMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Records file name inside the output directory when none is configured
pub const DEFAULT_RECORDS_FILE: &str = "records.json";

/// All projects of a configuration file, keyed by project name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigFile {
    pub projects: BTreeMap<String, ProjectConfig>,
}

impl ConfigFile {
    /// Load a configuration file from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
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

    /// Save the configuration file to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| Error::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Settings of one project
    pub fn project(&self, name: &str) -> Result<&ProjectConfig> {
        self.projects
            .get(name)
            .ok_or_else(|| Error::ProjectNotFound(name.to_string()))
    }
}

/// Settings of one project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Folder holding the REDCap project definition
    pub project_definition: PathBuf,
    /// Dataset root
    pub output_directory: PathBuf,
    /// Downloaded record export; defaults to `records.json` in the output directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records_file: Option<PathBuf>,
    /// Directory with one `sub-<s>_ses-<s>` folder of data files per session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_directory: Option<PathBuf>,
    /// How data files are placed
    #[serde(default)]
    pub mode: CreationMode,
    /// Recording hardware described in the probe/channel/contact tables
    #[serde(default)]
    pub hardware: Hardware,
}

impl ProjectConfig {
    /// Create a project configuration with defaults
    pub fn new(project_definition: impl Into<PathBuf>, output_directory: impl Into<PathBuf>) -> Self {
        Self {
            project_definition: project_definition.into(),
            output_directory: output_directory.into(),
            records_file: None,
            data_directory: None,
            mode: CreationMode::default(),
            hardware: Hardware::default(),
        }
    }

    /// Location of the record export
    pub fn records_path(&self) -> PathBuf {
        self.records_file
            .clone()
            .unwrap_or_else(|| self.output_directory.join(DEFAULT_RECORDS_FILE))
    }
}

/// Rows of the probes, channels and contacts tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hardware {
    #[serde(default)]
    pub probes: Vec<Probe>,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
}

/// One row of `probes.tsv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Probe {
    pub probe_id: String,
    #[serde(rename = "type")]
    pub probe_type: String,
    pub coordinate_space: String,
    pub material: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub shape: String,
    pub contact_size: f64,
}

/// One row of `channels.tsv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub channel_id: String,
    /// `n/a` for channels not tied to a contact
    pub contact_id: String,
    #[serde(rename = "type")]
    pub channel_type: String,
    pub units: String,
    pub sampling_frequency: f64,
    pub gain: f64,
    pub status: String,
}

/// One row of `contacts.tsv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub contact_id: String,
    pub probe_id: String,
    pub shank_id: String,
    pub impedance: f64,
    pub material: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub shape: String,
    pub contact_size: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_minimal_project() {
        let json = r#"{
            "SimpleProject": {
                "project_definition": "defs/simple",
                "output_directory": "out"
            }
        }"#;
        let config: ConfigFile = serde_json::from_str(json).unwrap();
        let project = config.project("SimpleProject").unwrap();

        assert_eq!(project.output_directory, PathBuf::from("out"));
        assert_eq!(project.mode, CreationMode::Copy);
        assert_eq!(project.records_path(), PathBuf::from("out/records.json"));
        assert!(project.hardware.probes.is_empty());
    }

    #[test]
    fn test_unknown_project() {
        let config = ConfigFile::default();
        assert!(matches!(
            config.project("Missing"),
            Err(Error::ProjectNotFound(name)) if name == "Missing"
        ));
    }

    #[test]
    fn test_parse_hardware_and_mode() {
        let json = r#"{
            "P": {
                "project_definition": "d",
                "output_directory": "o",
                "mode": "link",
                "hardware": {
                    "probes": [{
                        "probe_id": "t420a", "type": "tetrode", "coordinate_space": "3.6",
                        "material": "iridium-oxide", "x": 0, "y": 200, "z": 0,
                        "shape": "circle", "contact_size": 20
                    }]
                }
            }
        }"#;
        let config: ConfigFile = serde_json::from_str(json).unwrap();
        let project = config.project("P").unwrap();
        assert_eq!(project.mode, CreationMode::Link);
        assert_eq!(project.hardware.probes[0].probe_type, "tetrode");
        assert_eq!(project.hardware.probes[0].y, 200.0);
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        let mut config = ConfigFile::default();
        config
            .projects
            .insert("P".into(), ProjectConfig::new("defs", "out"));
        config.save(&path).unwrap();

        let loaded = ConfigFile::load(&path).unwrap();
        assert_eq!(loaded.project("P").unwrap().project_definition, PathBuf::from("defs"));
    }

    #[test]
    fn test_file_errors_carry_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ConfigFile::load(&path),
            Err(Error::JsonFile { path: p, .. }) if p == path
        ));

        let unwritable = tmp.path().join("missing/config.json");
        assert!(matches!(
            ConfigFile::default().save(&unwritable),
            Err(Error::FileWrite { path: p, .. }) if p == unwritable
        ));
    }
}
