//! Conversion pipelines: records in, BIDS ephys dataset out

use crate::config::{Hardware, ProjectConfig};
use crate::error::{Error, Result};
use crate::layout::{collect_data_files, BidsSession, CreationMode, DataKey, PLACEHOLDER_EXTENSION};
use crate::parser::{read_csv_records, read_json_records};
use crate::record::{SessionIds, SessionRecord};
use crate::templates::{MetadataWriter, Profile};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Settings shared by both pipelines
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Dataset name written to `dataset_description.json`
    pub project_name: String,
    /// How data files are placed
    pub mode: CreationMode,
    /// Data files registered for every session of a template-mode run
    pub data_files: Vec<PathBuf>,
    /// Directory with one `sub-<s>_ses-<s>` folder of data files per session
    pub data_directory: Option<PathBuf>,
    /// Probe, channel and contact rows
    pub hardware: Hardware,
}

impl ConvertOptions {
    /// Options of a configured project
    pub fn from_project(name: &str, project: &ProjectConfig) -> Self {
        Self {
            project_name: name.to_string(),
            mode: project.mode,
            data_files: Vec::new(),
            data_directory: project.data_directory.clone(),
            hardware: project.hardware.clone(),
        }
    }
}

/// What a conversion run wrote
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionReport {
    /// Dataset root
    pub root: PathBuf,
    /// Sessions converted, in record order
    pub sessions: Vec<SessionIds>,
    /// Data files placed in the dataset
    pub data_files: Vec<PathBuf>,
    /// Sidecar files written (a shared file is listed once per session)
    pub metadata_files: Vec<PathBuf>,
    /// Sessions that received an empty placeholder instead of data
    pub placeholders: usize,
}

/// Build a dataset from a CSV table with `sub_id`/`ses_id` columns.
///
/// The dataset root must already exist. Optional `tasks` and `runs` columns
/// label the data files of each session.
pub fn generate_from_csv<P: AsRef<Path>, Q: AsRef<Path>>(
    csv_file: P,
    root: Q,
    options: &ConvertOptions,
) -> Result<ConversionReport> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(Error::MissingDirectory(root.to_path_buf()));
    }

    let records = read_csv_records(csv_file)?;
    convert(&records, root, options, Profile::Basic, SessionIds::from_columns)
}

/// Build a dataset from DigLab records exported by REDCap.
///
/// The dataset root is created when missing, once every record passed its
/// checks.
pub fn convert_records<Q: AsRef<Path>>(
    records: &[SessionRecord],
    root: Q,
    options: &ConvertOptions,
) -> Result<ConversionReport> {
    convert(records, root.as_ref(), options, Profile::DigLab, SessionIds::from_diglab)
}

/// Convert the record export of a configured project
pub fn convert_project(name: &str, project: &ProjectConfig) -> Result<ConversionReport> {
    let records = read_json_records(project.records_path())?;
    let options = ConvertOptions::from_project(name, project);
    convert_records(&records, &project.output_directory, &options)
}

/// A session whose record and data files passed every check
struct PlannedSession<'a> {
    session: BidsSession,
    record: &'a SessionRecord,
    key: DataKey,
}

fn convert(
    records: &[SessionRecord],
    root: &Path,
    options: &ConvertOptions,
    profile: Profile,
    ids_of: fn(&SessionRecord) -> Result<SessionIds>,
) -> Result<ConversionReport> {
    let planned = plan_sessions(records, root, options, profile, ids_of)?;
    fs::create_dir_all(root).map_err(|e| Error::FileWrite {
        path: root.to_path_buf(),
        source: e,
    })?;

    let mut report = ConversionReport {
        root: root.to_path_buf(),
        ..ConversionReport::default()
    };

    for PlannedSession {
        session,
        record,
        key,
    } in planned
    {
        let ids = &session.ids;
        let _span = tracing::info_span!("session", sub = %ids.subject, ses = %ids.session).entered();

        session.generate_structure()?;
        let placed = if session.has_data() {
            session.organize_data_files(options.mode)?
        } else {
            report.placeholders += 1;
            vec![session.touch_placeholder(&key)?]
        };

        let writer = MetadataWriter {
            session: &session,
            record,
            profile,
            project_name: &options.project_name,
            hardware: &options.hardware,
            data_files: &placed,
        };
        let written = writer.generate_all_metadata_files()?;

        tracing::info!(
            data_files = placed.len(),
            metadata_files = written.len(),
            "session converted"
        );
        report.sessions.push(session.ids.clone());
        report.data_files.extend(placed);
        report.metadata_files.extend(written);
    }

    Ok(report)
}

/// Check every record and its data files before anything is written, so a
/// failing run leaves both the dataset and the sources as they were
fn plan_sessions<'a>(
    records: &'a [SessionRecord],
    root: &Path,
    options: &ConvertOptions,
    profile: Profile,
    ids_of: fn(&SessionRecord) -> Result<SessionIds>,
) -> Result<Vec<PlannedSession<'a>>> {
    let mut seen = BTreeSet::new();
    let mut moved = BTreeSet::new();
    let mut planned = Vec::with_capacity(records.len());

    for record in records {
        let ids = ids_of(record)?;
        if !seen.insert(ids.clone()) {
            return Err(Error::DuplicateSession {
                subject: ids.subject,
                session: ids.session,
            });
        }

        let key = DataKey::new(record.get("tasks"), record.get("runs"))?;
        let data_files = session_data_files(&ids, options)?;
        let mut session = BidsSession::new(ids, root);
        session.register_data_files(data_files, key.task.as_deref(), key.run.as_deref())?;

        for (source, _) in session.placements()? {
            if options.mode == CreationMode::Move && !moved.insert(source.clone()) {
                return Err(Error::SharedMoveSource(source));
            }
        }

        MetadataWriter {
            session: &session,
            record,
            profile,
            project_name: &options.project_name,
            hardware: &options.hardware,
            data_files: &[],
        }
        .check_record()?;

        planned.push(PlannedSession {
            session,
            record,
            key,
        });
    }
    Ok(planned)
}

fn session_data_files(ids: &SessionIds, options: &ConvertOptions) -> Result<Vec<PathBuf>> {
    if let Some(dir) = &options.data_directory {
        let session_dir = dir.join(ids.file_prefix());
        if session_dir.is_dir() {
            return collect_data_files(&session_dir, PLACEHOLDER_EXTENSION);
        }
        tracing::warn!(dir = %session_dir.display(), "no data folder for session");
    }
    Ok(options.data_files.clone())
}
