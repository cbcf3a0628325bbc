//! Session records and the subject/session identifiers derived from them

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Columns every template-mode record table must provide
pub const ESSENTIAL_COLUMNS: &[&str] = &["sub_id", "ses_id"];

/// Columns template mode understands but does not require
pub const OPTIONAL_COLUMNS: &[&str] = &["tasks", "runs"];

/// Separator REDCap puts between a checkbox question and its choice code
const CHOICE_SEPARATOR: &str = "___";

/// Value REDCap exports for a ticked checkbox
const CHOICE_ACTIVE: &str = "1";

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\W_]+").unwrap());

/// One session worth of metadata: field name to value, in source column order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    fields: Vec<(String, String)>,
}

impl SessionRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing an existing value of the same name
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(field) => field.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Look up a field value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Look up a field that a template cannot do without
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| Error::MissingField(name.to_string()))
    }

    /// Look up a field, treating blank values as absent
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.trim().is_empty())
    }

    /// Check whether a field is present
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate over field names in column order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Selected options of a multiple-choice question.
    ///
    /// A checkbox question `label` is exported as one column per option,
    /// `label___<choice>`, holding `1` when ticked. Returns the ticked
    /// `<choice>` codes in column order.
    pub fn choices(&self, label: &str) -> Vec<String> {
        let prefix = format!("{label}{CHOICE_SEPARATOR}");
        self.fields
            .iter()
            .filter_map(|(name, value)| {
                let choice = name.strip_prefix(&prefix)?;
                let is_code = !choice.is_empty()
                    && choice.chars().all(|c| c.is_alphanumeric() || c == '_');
                (is_code && value.trim() == CHOICE_ACTIVE).then(|| choice.to_string())
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SessionRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = SessionRecord::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

/// Subject and session labels of one BIDS session folder
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionIds {
    /// Subject label, without the `sub-` prefix
    pub subject: String,
    /// Session label, without the `ses-` prefix
    pub session: String,
}

impl SessionIds {
    /// Create identifiers, rejecting labels that cannot appear in a BIDS path
    pub fn new(subject: impl Into<String>, session: impl Into<String>) -> Result<Self> {
        let subject = subject.into();
        let session = session.into();
        check_label("subject", &subject)?;
        check_label("session", &session)?;
        Ok(Self { subject, session })
    }

    /// Identifiers of a template-mode row (`sub_id`, `ses_id` columns)
    pub fn from_columns(record: &SessionRecord) -> Result<Self> {
        Self::new(record.require("sub_id")?, record.require("ses_id")?)
    }

    /// Identifiers of a DigLab record.
    ///
    /// The subject is the `guid`. The session is the acquisition `date`,
    /// extended with `id<ses_number>` and `c<ses_custom_field>` when those
    /// fields exist. Non-word characters and underscores are stripped from
    /// both.
    pub fn from_diglab(record: &SessionRecord) -> Result<Self> {
        let subject = record.require("guid")?;
        let mut session = record.require("date")?.to_string();

        for (sep, key) in [("id", "ses_number"), ("c", "ses_custom_field")] {
            if let Some(value) = record.get(key) {
                session.push_str(sep);
                session.push_str(value);
            }
        }

        Self::new(clean_label(subject), clean_label(&session))
    }

    /// `sub-<subject>`
    pub fn subject_dir(&self) -> String {
        format!("sub-{}", self.subject)
    }

    /// `ses-<session>`
    pub fn session_dir(&self) -> String {
        format!("ses-{}", self.session)
    }

    /// `sub-<subject>_ses-<session>`, the prefix of data-level file names
    pub fn file_prefix(&self) -> String {
        format!("sub-{}_ses-{}", self.subject, self.session)
    }
}

/// Remove every run of non-word characters and underscores
pub fn clean_label(value: &str) -> String {
    NON_WORD.replace_all(value, "").into_owned()
}

/// Check that a label matches the rule table's label pattern
pub(crate) fn check_label(entity: &'static str, value: &str) -> Result<()> {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier {
            entity,
            value: value.to_string(),
        })
    }
}
