//! Sidecar metadata files of a BIDS ephys session
//!
//! Each sidecar has a fixed layout. Values come from the session record,
//! the project hardware description and the data files placed for the
//! session. The rule table decides where each file goes and whether its
//! name is legal there.

use crate::config::Hardware;
use crate::error::{Error, Result};
use crate::layout::{BidsSession, MODALITY};
use crate::record::{clean_label, SessionRecord};
use crate::rules::{self, Level};
use crate::table::{load_json, save_json, TsvTable, NOT_AVAILABLE};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// BIDS version declared in `dataset_description.json`
pub const BIDS_VERSION: &str = "1.6.0";

/// Dataset license declared in `dataset_description.json`
pub const LICENSE: &str = "CC BY 4.0";

/// Filler for description fields curated by hand after conversion
pub const TO_BE_ANNOUNCED: &str = "TBA";

/// Number of special event slots on the DigLab form
pub const SPECIAL_EVENT_SLOTS: usize = 3;

pub const PARTICIPANTS_COLUMNS: &[&str] = &["participant_id"];

pub const SESSIONS_COLUMNS: &[&str] = &["session_id", "acq_time", "systolic_blood_pressure"];

pub const PROBES_COLUMNS: &[&str] = &[
    "probe_id",
    "type",
    "coordinate_space",
    "material",
    "x",
    "y",
    "z",
    "shape",
    "contact_size",
];

pub const CHANNELS_COLUMNS: &[&str] = &[
    "channel_id",
    "contact_id",
    "type",
    "units",
    "sampling_frequency",
    "gain",
    "status",
];

pub const CONTACTS_COLUMNS: &[&str] = &[
    "contact_id",
    "probe_id",
    "shank_id",
    "impedance",
    "material",
    "x",
    "y",
    "z",
    "shape",
    "contact_size",
];

pub const SCANS_COLUMNS: &[&str] = &[
    "filename",
    "acq_date",
    "exp_name",
    "stimulation",
    "post_trial_data",
    "time_last_trial",
    "data_quality",
    "incomplete_session",
    "fluid_reward",
    "fluid_reward_unit",
    "additional_fluid_reward",
];

/// Scans layout of sessions described by a plain record table
pub const BASIC_SCANS_COLUMNS: &[&str] = &["filename", "acq_date"];

/// Which record layout the templates read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Plain `sub_id`/`ses_id` tables; DigLab form fields are optional
    Basic,
    /// REDCap records of the DigLab form; form fields are required
    DigLab,
}

/// Sidecar files written for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataFile {
    DatasetDescription,
    Participants,
    Sessions,
    Probes,
    Channels,
    Contacts,
    Ephys,
    Scans,
}

impl MetadataFile {
    /// All sidecar files, root level first
    pub const ALL: [MetadataFile; 8] = [
        MetadataFile::DatasetDescription,
        MetadataFile::Participants,
        MetadataFile::Sessions,
        MetadataFile::Probes,
        MetadataFile::Channels,
        MetadataFile::Contacts,
        MetadataFile::Ephys,
        MetadataFile::Scans,
    ];

    /// Base name, as listed in the rule table
    pub fn name(self) -> &'static str {
        match self {
            MetadataFile::DatasetDescription => "dataset_description",
            MetadataFile::Participants => "participants",
            MetadataFile::Sessions => "sessions",
            MetadataFile::Probes => "probes",
            MetadataFile::Channels => "channels",
            MetadataFile::Contacts => "contacts",
            MetadataFile::Ephys => "ephys",
            MetadataFile::Scans => "scans",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            MetadataFile::DatasetDescription | MetadataFile::Ephys => "json",
            _ => "tsv",
        }
    }

    /// Level the rule table assigns to this file
    pub fn level(self) -> Option<Level> {
        rules::level_of(self.name())
    }

    /// Whether a profile produces this file
    pub fn applies_to(self, profile: Profile) -> bool {
        !(profile == Profile::Basic && self == MetadataFile::Ephys)
    }
}

impl fmt::Display for MetadataFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name(), self.extension())
    }
}

/// `dataset_description.json`.
///
/// Fields missing from an existing file take their defaults; keys this tool
/// does not know are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DatasetDescription {
    pub name: String,
    #[serde(rename = "BIDSVersion")]
    pub bids_version: String,
    pub license: String,
    pub authors: Vec<String>,
    pub acknowledgements: String,
    pub how_to_acknowledge: String,
    pub funding: Vec<String>,
    pub references_and_links: String,
    pub ethics_approvals: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for DatasetDescription {
    fn default() -> Self {
        Self::new("")
    }
}

impl DatasetDescription {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            bids_version: BIDS_VERSION.to_string(),
            license: LICENSE.to_string(),
            authors: Vec::new(),
            acknowledgements: TO_BE_ANNOUNCED.to_string(),
            how_to_acknowledge: TO_BE_ANNOUNCED.to_string(),
            funding: vec![TO_BE_ANNOUNCED.to_string()],
            references_and_links: TO_BE_ANNOUNCED.to_string(),
            ethics_approvals: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }
}

/// `sub-<s>_ses-<s>_ephys.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EphysSidecar {
    pub creator: String,
    pub comments: String,
    pub session_number: String,
    pub subject: SubjectInfo,
    pub special_events: BTreeMap<String, SpecialEvent>,
    pub modalities: Vec<String>,
    pub setup: SetupInfo,
    pub rewards: Rewards,
    #[serde(rename = "DigLab")]
    pub diglab: DigLabInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubjectInfo {
    pub weight: String,
    pub weight_unit: String,
    pub comments: String,
    pub subject_behaviour: Vec<String>,
    pub post_trial_subject_behaviour: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpecialEvent {
    pub comment: String,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SetupInfo {
    pub comments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Rewards {
    pub fluid_type: Vec<String>,
    pub other_type: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigLabInfo {
    pub record_id: String,
}

/// Writes the sidecar files of one session
pub struct MetadataWriter<'a> {
    pub session: &'a BidsSession,
    pub record: &'a SessionRecord,
    pub profile: Profile,
    pub project_name: &'a str,
    pub hardware: &'a Hardware,
    /// Data files already placed in the session's data folder
    pub data_files: &'a [PathBuf],
}

impl MetadataWriter<'_> {
    /// File name of a sidecar; data-level files carry the session prefix
    pub fn file_name(&self, file: MetadataFile, level: Level) -> String {
        match level {
            Level::Data => format!("{}_{}", self.session.ids.file_prefix(), file),
            _ => file.to_string(),
        }
    }

    /// Path of a sidecar after checking it against the rule table
    pub fn metadata_path(&self, file: MetadataFile) -> Result<PathBuf> {
        let level = file.level().ok_or_else(|| Error::UnauthorizedMetadata {
            file: file.to_string(),
            level: "any".to_string(),
        })?;
        let name = self.file_name(file, level);
        if !rules::is_authorized(level, &name) {
            return Err(Error::UnauthorizedMetadata {
                file: name,
                level: level.to_string(),
            });
        }
        Ok(self.session.level_dir(level).join(name))
    }

    /// Write every sidecar the profile calls for; returns the written paths
    pub fn generate_all_metadata_files(&self) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for file in MetadataFile::ALL {
            if !file.applies_to(self.profile) {
                continue;
            }
            let path = self.metadata_path(file)?;
            self.generate(file, &path)?;
            tracing::debug!(path = %path.display(), "wrote {file}");
            written.push(path);
        }
        Ok(written)
    }

    /// Write one sidecar to `path`
    pub fn generate(&self, file: MetadataFile, path: &Path) -> Result<()> {
        match file {
            MetadataFile::DatasetDescription => self.generate_dataset_description(path),
            MetadataFile::Participants => self.generate_participants(path),
            MetadataFile::Sessions => self.generate_sessions(path),
            MetadataFile::Probes => {
                TsvTable::from_records(PROBES_COLUMNS, &self.hardware.probes)?.save(path)
            }
            MetadataFile::Channels => {
                TsvTable::from_records(CHANNELS_COLUMNS, &self.hardware.channels)?.save(path)
            }
            MetadataFile::Contacts => {
                TsvTable::from_records(CONTACTS_COLUMNS, &self.hardware.contacts)?.save(path)
            }
            MetadataFile::Ephys => save_json(&self.ephys_sidecar()?, path),
            MetadataFile::Scans => self.scans_table()?.save(path),
        }
    }

    /// Check that the record holds everything the sidecars read from it,
    /// without touching the file system
    pub fn check_record(&self) -> Result<()> {
        self.check_subject()?;
        for name in ["user", "ethical_protocol_id", "date"] {
            self.field(name)?;
        }
        if MetadataFile::Ephys.applies_to(self.profile) {
            self.ephys_sidecar()?;
        }
        self.scan_values()?;
        Ok(())
    }

    fn check_subject(&self) -> Result<()> {
        if self.profile == Profile::DigLab {
            let subject = &self.session.ids.subject;
            let guid = clean_label(self.record.require("guid")?);
            if &guid != subject {
                return Err(Error::SubjectMismatch {
                    expected: subject.clone(),
                    found: guid,
                });
            }
        }
        Ok(())
    }

    fn field(&self, name: &str) -> Result<Option<String>> {
        match self.profile {
            Profile::DigLab => self.record.require(name).map(|v| Some(v.to_string())),
            Profile::Basic => Ok(self.record.get(name).map(str::to_string)),
        }
    }

    fn generate_participants(&self, path: &Path) -> Result<()> {
        self.check_subject()?;
        let mut table = TsvTable::load_or_new(path, PARTICIPANTS_COLUMNS)?;
        if table.push_unique(vec![self.session.ids.subject_dir()]) {
            table.save(path)?;
        }
        Ok(())
    }

    fn generate_dataset_description(&self, path: &Path) -> Result<()> {
        let mut description: DatasetDescription = if path.exists() {
            load_json(path)?
        } else {
            DatasetDescription::new(self.project_name)
        };
        description.name = self.project_name.to_string();

        if let Some(author) = self.field("user")?.filter(|a| !a.is_empty()) {
            push_distinct(&mut description.authors, author);
        }
        if let Some(approval) = self.field("ethical_protocol_id")?.filter(|a| !a.is_empty()) {
            push_distinct(&mut description.ethics_approvals, approval);
        }
        save_json(&description, path)
    }

    fn generate_sessions(&self, path: &Path) -> Result<()> {
        let acq_time = self
            .record
            .non_empty("date")
            .map_or_else(|| NOT_AVAILABLE.to_string(), format_acq_time);
        let pressure = self
            .record
            .non_empty("systolic_blood_pressure")
            .unwrap_or(NOT_AVAILABLE)
            .to_string();

        let mut table = TsvTable::load_or_new(path, SESSIONS_COLUMNS)?;
        if table.push_unique(vec![self.session.ids.session_dir(), acq_time, pressure]) {
            table.save(path)?;
        }
        Ok(())
    }

    /// Contents of the ephys sidecar of a DigLab record
    pub fn ephys_sidecar(&self) -> Result<EphysSidecar> {
        let record = self.record;
        let text = |name: &str| record.require(name).map(str::to_string);

        let mut fluid_type = record.choices("reward_fluid_type");
        if let Some(other) = record.non_empty("reward_fluid_type_other") {
            fluid_type.push(other.to_string());
        }

        let mut special_events = BTreeMap::new();
        for slot in 0..SPECIAL_EVENT_SLOTS {
            if let Some(comment) = record.non_empty(&format!("special_event_{slot}")) {
                special_events.insert(
                    slot.to_string(),
                    SpecialEvent {
                        comment: comment.to_string(),
                        time: text(&format!("special_event_time_{slot}"))?,
                    },
                );
            }
        }

        Ok(EphysSidecar {
            creator: text("user")?,
            comments: text("comments_exp")?,
            session_number: text("ses_number")?,
            subject: SubjectInfo {
                weight: text("weight")?,
                weight_unit: "kg".to_string(),
                comments: text("comments_subject")?,
                subject_behaviour: record.choices("subject_behaviour"),
                post_trial_subject_behaviour: record.choices("subject_behaviour_2"),
            },
            special_events,
            modalities: record.choices("modality"),
            setup: SetupInfo {
                comments: text("comments_setup")?,
            },
            rewards: Rewards {
                fluid_type,
                other_type: record.choices("reward_other"),
            },
            diglab: DigLabInfo {
                record_id: text("record_id")?,
            },
        })
    }

    /// One row per placed data file
    pub fn scans_table(&self) -> Result<TsvTable> {
        let columns = match self.profile {
            Profile::Basic => BASIC_SCANS_COLUMNS,
            Profile::DigLab => SCANS_COLUMNS,
        };
        let mut table = TsvTable::new(columns);
        let acq_date = self
            .field("date")?
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());

        let values = self.scan_values()?;

        for data_file in self.data_files {
            let Some(name) = data_file.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let mut row = vec![format!("{MODALITY}/{name}"), acq_date.clone()];
            row.extend(values.iter().cloned());
            table.push_row(row);
        }
        Ok(table)
    }

    /// Scans columns after `filename` and `acq_date`; none for plain tables
    fn scan_values(&self) -> Result<Vec<String>> {
        if self.profile == Profile::Basic {
            return Ok(Vec::new());
        }
        let text = |field: &str| self.record.require(field).map(str::to_string);
        Ok(vec![
            text("exp_name")?,
            text("stimulation___yes")?,
            text("subject_behaviour_multi___yes")?,
            text("time_last_trial")?,
            self.record.choices("data_quality").join(","),
            text("incomplete_session___yes")?,
            text("reward_fluid")?,
            "ml".to_string(),
            text("reward_fluid_additional")?,
        ])
    }
}

fn push_distinct(values: &mut Vec<String>, value: String) {
    if !values.contains(&value) {
        values.push(value);
    }
}

/// Render a record date as an ISO 8601 acquisition time.
/// REDCap exports dates as `YYYY-MM-DD` and date-times as
/// `YYYY-MM-DD HH:MM` or `YYYY-MM-DD HH:MM:SS`.
pub fn format_acq_time(value: &str) -> String {
    const ISO: &str = "%Y-%m-%dT%H:%M:%S";
    let value = value.trim();

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", ISO] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return dt.format(ISO).to_string();
        }
    }
    if let Some(dt) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return dt.format(ISO).to_string();
    }

    tracing::warn!(value, "unrecognised session date");
    NOT_AVAILABLE.to_string()
}
