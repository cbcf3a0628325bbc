//! Static naming rules of the BEP032 ephys layout
//!
//! Each directory depth of a dataset has a naming pattern and a fixed list of
//! metadata files that may live there. The generator consults this table
//! before writing any sidecar file.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

/// Pattern of subject and session labels
pub const LABEL_PATTERN: &str = "[a-zA-Z0-9]+";

/// Directory depth inside a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Level {
    /// Dataset root
    Dataset,
    /// `sub-<label>`
    Subject,
    /// `ses-<label>`
    Session,
    /// Modality folder holding data files
    Data,
}

impl Level {
    /// All levels, root first
    pub const ALL: [Level; 4] = [Level::Dataset, Level::Subject, Level::Session, Level::Data];

    /// Depth below the dataset root
    pub fn depth(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Dataset => "dataset",
            Level::Subject => "subject",
            Level::Session => "session",
            Level::Data => "data",
        };
        write!(f, "{} ({})", self.depth(), name)
    }
}

/// Naming rule for one directory level
#[derive(Debug, Clone, Serialize)]
pub struct Rule {
    /// Level this rule governs
    pub level: Level,
    /// Pattern the directory name must match (empty for the root)
    pub directory: &'static str,
    /// Metadata files allowed in this directory. Data-level names are
    /// given without the `sub-<s>_ses-<s>_` prefix.
    pub authorized_metadata_files: &'static [&'static str],
}

/// The rule table, indexed by level depth
pub static RULES_SET: [Rule; 4] = [
    Rule {
        level: Level::Dataset,
        directory: "",
        authorized_metadata_files: &[
            "dataset_description.json",
            "README",
            "CHANGES",
            "LICENSE",
            "participants.tsv",
            "participants.json",
            "tasks.tsv",
            "tasks.json",
        ],
    },
    Rule {
        level: Level::Subject,
        directory: "sub-[a-zA-Z0-9]+",
        authorized_metadata_files: &["sessions.tsv", "sessions.json"],
    },
    Rule {
        level: Level::Session,
        directory: "ses-[a-zA-Z0-9]+",
        authorized_metadata_files: &[],
    },
    Rule {
        level: Level::Data,
        directory: "ephys",
        authorized_metadata_files: &[
            "probes.tsv",
            "probes.json",
            "channels.tsv",
            "channels.json",
            "contacts.tsv",
            "contacts.json",
            "ephys.json",
            "scans.tsv",
            "scans.json",
        ],
    },
];

/// Compiled file-name patterns: (level, metadata base name, regex)
static FILE_PATTERNS: LazyLock<Vec<(Level, &'static str, Regex)>> = LazyLock::new(|| {
    RULES_SET
        .iter()
        .flat_map(|rule| {
            rule.authorized_metadata_files
                .iter()
                .map(move |file| (rule.level, *file))
        })
        .map(|(level, file)| {
            let (base, pattern) = build_rule_regexp(level, file);
            (level, base, Regex::new(&pattern).unwrap())
        })
        .collect()
});

static DIRECTORY_PATTERNS: LazyLock<Vec<(Level, Regex)>> = LazyLock::new(|| {
    RULES_SET
        .iter()
        .map(|rule| {
            let pattern = format!("^{}$", rule.directory);
            (rule.level, Regex::new(&pattern).unwrap())
        })
        .collect()
});

static DATA_FILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        "^sub-{l}(_ses-{l})?(_task-{l})?(_run-{l})?(_split-[0-9]+)?_ephys(\\.[a-zA-Z0-9]+)?$",
        l = LABEL_PATTERN
    );
    Regex::new(&pattern).unwrap()
});

/// Metadata base name (file name without extension) and the full-name
/// pattern of one authorized file.
fn build_rule_regexp(level: Level, file: &'static str) -> (&'static str, String) {
    let base = file.split_once('.').map_or(file, |(base, _)| base);
    let escaped = regex::escape(file);
    let pattern = match level {
        Level::Data => format!("^sub-{LABEL_PATTERN}(_ses-{LABEL_PATTERN})?_{escaped}$"),
        _ => format!("^{escaped}$"),
    };
    (base, pattern)
}

/// Rule governing a level
pub fn rule(level: Level) -> &'static Rule {
    &RULES_SET[level.depth()]
}

/// Level at which a metadata file of the given base name (e.g. `probes`)
/// belongs
pub fn level_of(metadata_name: &str) -> Option<Level> {
    FILE_PATTERNS
        .iter()
        .find(|(_, base, _)| *base == metadata_name)
        .map(|(level, _, _)| *level)
}

/// Check whether a metadata file name may be written at a level
pub fn is_authorized(level: Level, file_name: &str) -> bool {
    FILE_PATTERNS
        .iter()
        .any(|(l, _, re)| *l == level && re.is_match(file_name))
}

/// Check whether a directory name is valid for a level
pub fn is_valid_directory(level: Level, dir_name: &str) -> bool {
    DIRECTORY_PATTERNS
        .iter()
        .any(|(l, re)| *l == level && re.is_match(dir_name))
}

/// Check whether a name is a valid data file name of the data level
pub fn is_valid_data_file(file_name: &str) -> bool {
    DATA_FILE_PATTERN.is_match(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_of() {
        assert_eq!(level_of("participants"), Some(Level::Dataset));
        assert_eq!(level_of("dataset_description"), Some(Level::Dataset));
        assert_eq!(level_of("sessions"), Some(Level::Subject));
        assert_eq!(level_of("probes"), Some(Level::Data));
        assert_eq!(level_of("ephys"), Some(Level::Data));
        assert_eq!(level_of("unknown"), None);
    }

    #[test]
    fn test_authorized_root_files() {
        assert!(is_authorized(Level::Dataset, "participants.tsv"));
        assert!(is_authorized(Level::Dataset, "README"));
        assert!(!is_authorized(Level::Dataset, "sessions.tsv"));
        assert!(!is_authorized(Level::Subject, "participants.tsv"));
    }

    #[test]
    fn test_authorized_data_files_need_prefix() {
        assert!(is_authorized(Level::Data, "sub-01_ses-20210101_probes.tsv"));
        assert!(is_authorized(Level::Data, "sub-01_ephys.json"));
        assert!(!is_authorized(Level::Data, "probes.tsv"));
        assert!(!is_authorized(Level::Data, "sub-0_1_ses-1_probes.tsv"));
        assert!(!is_authorized(Level::Data, "sub-01_ses-1_probesXtsv"));
    }

    #[test]
    fn test_session_level_has_no_metadata() {
        assert!(rule(Level::Session).authorized_metadata_files.is_empty());
        assert!(!is_authorized(Level::Session, "sessions.tsv"));
    }

    #[test]
    fn test_directory_names() {
        assert!(is_valid_directory(Level::Subject, "sub-01"));
        assert!(!is_valid_directory(Level::Subject, "sub-0-1"));
        assert!(is_valid_directory(Level::Session, "ses-20210101id3"));
        assert!(is_valid_directory(Level::Data, "ephys"));
        assert!(!is_valid_directory(Level::Data, "anat"));
    }

    #[test]
    fn test_data_file_names() {
        assert!(is_valid_data_file("sub-01_ses-1_ephys.nix"));
        assert!(is_valid_data_file("sub-01_ses-1_task-rest_run-2_ephys.nix"));
        assert!(is_valid_data_file("sub-01_ses-1_task-rest_split-3_ephys.nix"));
        assert!(!is_valid_data_file("sub-01_ses-1_task-rest_eyes_ephys.nix"));
        assert!(!is_valid_data_file("sub-01_ses-1_run-2_task-rest_ephys.nix"));
    }
}
