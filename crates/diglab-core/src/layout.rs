//! Session folder layout and placement of data files

use crate::error::{Error, Result};
use crate::record::{check_label, SessionIds};
use crate::rules::{self, Level};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use walkdir::WalkDir;

/// Modality folder of every session
pub const MODALITY: &str = "ephys";

/// Extension of placeholder data files
pub const PLACEHOLDER_EXTENSION: &str = "nix";

/// How a data file is brought into the dataset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreationMode {
    /// Copy the source, leaving it in place
    #[default]
    Copy,
    /// Hard-link the source
    Link,
    /// Move the source into the dataset
    Move,
}

impl FromStr for CreationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "copy" => Ok(CreationMode::Copy),
            "link" => Ok(CreationMode::Link),
            "move" => Ok(CreationMode::Move),
            other => Err(Error::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for CreationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CreationMode::Copy => "copy",
            CreationMode::Link => "link",
            CreationMode::Move => "move",
        };
        f.write_str(name)
    }
}

/// Create `destination` from `source` using the given mode.
///
/// Nothing is done when `destination` already is `source`, for example a
/// hard link left by an earlier run.
pub fn create_file(source: &Path, destination: &Path, mode: CreationMode) -> Result<()> {
    let write_err = |e| Error::FileWrite {
        path: destination.to_path_buf(),
        source: e,
    };

    if destination.exists() && same_file::is_same_file(source, destination).map_err(write_err)? {
        tracing::debug!(
            source = %source.display(),
            destination = %destination.display(),
            "destination already is the source file"
        );
        return Ok(());
    }

    match mode {
        CreationMode::Copy => {
            fs::copy(source, destination).map_err(write_err)?;
        }
        CreationMode::Link => {
            if destination.exists() {
                fs::remove_file(destination).map_err(write_err)?;
            }
            fs::hard_link(source, destination).map_err(write_err)?;
        }
        CreationMode::Move => {
            // rename fails across file systems
            if fs::rename(source, destination).is_err() {
                fs::copy(source, destination).map_err(write_err)?;
                fs::remove_file(source).map_err(write_err)?;
            }
        }
    }
    Ok(())
}

/// Entities distinguishing data files of one session
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataKey {
    pub task: Option<String>,
    pub run: Option<String>,
}

impl DataKey {
    /// Create a key from optional task and run labels
    pub fn new(task: Option<&str>, run: Option<&str>) -> Result<Self> {
        if let Some(task) = task {
            check_label("task", task)?;
        }
        if let Some(run) = run {
            check_label("run", run)?;
        }
        Ok(Self {
            task: task.map(str::to_string),
            run: run.map(str::to_string),
        })
    }

    /// File-name infix: `""`, `_task-<t>`, `_run-<r>` or `_task-<t>_run-<r>`
    pub fn infix(&self) -> String {
        let mut infix = String::new();
        if let Some(task) = &self.task {
            infix.push_str(&format!("_task-{task}"));
        }
        if let Some(run) = &self.run {
            infix.push_str(&format!("_run-{run}"));
        }
        infix
    }
}

/// One BIDS session: identifiers, dataset root and registered data files
#[derive(Debug, Clone)]
pub struct BidsSession {
    pub ids: SessionIds,
    pub basedir: PathBuf,
    data: BTreeMap<DataKey, Vec<PathBuf>>,
}

impl BidsSession {
    /// Create a session rooted at `basedir`
    pub fn new(ids: SessionIds, basedir: impl Into<PathBuf>) -> Self {
        Self {
            ids,
            basedir: basedir.into(),
            data: BTreeMap::new(),
        }
    }

    /// Directory of a level for this session
    pub fn level_dir(&self, level: Level) -> PathBuf {
        let mut dir = self.basedir.clone();
        if level >= Level::Subject {
            dir.push(self.ids.subject_dir());
        }
        if level >= Level::Session {
            dir.push(self.ids.session_dir());
        }
        if level >= Level::Data {
            dir.push(MODALITY);
        }
        dir
    }

    /// Folder data files are placed in
    pub fn data_dir(&self) -> PathBuf {
        self.level_dir(Level::Data)
    }

    /// Create `sub-<s>/ses-<s>/ephys` below the dataset root
    pub fn generate_structure(&self) -> Result<PathBuf> {
        let dir = self.data_dir();
        for (level, name) in [
            (Level::Subject, self.ids.subject_dir()),
            (Level::Session, self.ids.session_dir()),
            (Level::Data, MODALITY.to_string()),
        ] {
            if !rules::is_valid_directory(level, &name) {
                return Err(Error::InvalidIdentifier {
                    entity: "directory",
                    value: name,
                });
            }
        }
        fs::create_dir_all(&dir).map_err(|e| Error::FileWrite {
            path: dir.clone(),
            source: e,
        })?;
        tracing::debug!(dir = %dir.display(), "created session structure");
        Ok(dir)
    }

    /// Register data files under a task/run key
    pub fn register_data_files<I, P>(
        &mut self,
        files: I,
        task: Option<&str>,
        run: Option<&str>,
    ) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.data
            .entry(DataKey::new(task, run)?)
            .or_default()
            .extend(files.into_iter().map(Into::into));
        Ok(())
    }

    /// Registered data files by key
    pub fn registered(&self) -> &BTreeMap<DataKey, Vec<PathBuf>> {
        &self.data
    }

    /// Check whether any data file is registered
    pub fn has_data(&self) -> bool {
        self.data.values().any(|files| !files.is_empty())
    }

    /// Target file name of a registered data file
    fn target_name(&self, key: &DataKey, split: Option<usize>, source: &Path) -> String {
        let mut name = format!("{}{}", self.ids.file_prefix(), key.infix());
        if let Some(split) = split {
            name.push_str(&format!("_split-{split}"));
        }
        name.push('_');
        name.push_str(MODALITY);
        if let Some(ext) = source.extension().and_then(|e| e.to_str()) {
            name.push('.');
            name.push_str(ext);
        }
        name
    }

    /// Source and destination of every registered file, in key order.
    ///
    /// Several files under one key are told apart by a `_split-<n>` entity.
    /// Fails on missing sources and on names the rule table rejects.
    pub fn placements(&self) -> Result<Vec<(PathBuf, PathBuf)>> {
        let dir = self.data_dir();
        let mut placements = Vec::new();

        for (key, files) in &self.data {
            let numbered = files.len() > 1;
            for (idx, source) in files.iter().enumerate() {
                if !source.is_file() {
                    return Err(Error::DataFileNotFound(source.clone()));
                }
                let split = numbered.then_some(idx + 1);
                let name = self.target_name(key, split, source);
                if !rules::is_valid_data_file(&name) {
                    return Err(Error::InvalidIdentifier {
                        entity: "data file",
                        value: name,
                    });
                }
                placements.push((source.clone(), dir.join(name)));
            }
        }
        Ok(placements)
    }

    /// Place every registered file in the data folder; returns the
    /// destination paths in key order
    pub fn organize_data_files(&self, mode: CreationMode) -> Result<Vec<PathBuf>> {
        let placements = self.placements()?;
        let mut placed = Vec::with_capacity(placements.len());
        for (source, destination) in placements {
            create_file(&source, &destination, mode)?;
            tracing::debug!(
                source = %source.display(),
                destination = %destination.display(),
                %mode,
                "placed data file"
            );
            placed.push(destination);
        }
        Ok(placed)
    }

    /// Write an empty placeholder data file for a session without data
    pub fn touch_placeholder(&self, key: &DataKey) -> Result<PathBuf> {
        let name = format!(
            "{}{}_{}.{}",
            self.ids.file_prefix(),
            key.infix(),
            MODALITY,
            PLACEHOLDER_EXTENSION
        );
        let path = self.data_dir().join(name);
        if !path.exists() {
            fs::File::create(&path).map_err(|e| Error::FileWrite {
                path: path.clone(),
                source: e,
            })?;
        }
        Ok(path)
    }
}

/// Find data files with a given extension below a directory, sorted by path
pub fn collect_data_files<P: AsRef<Path>>(root: P, extension: &str) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(Error::MissingDirectory(root.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == extension) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}
