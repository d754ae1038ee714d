use crate::common::Version;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// How a changeset is applied to the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangesetType {
    /// A folder of json documents, upserted one per file.
    Documents,
    /// A script of query statements.
    QueryScript,
    /// A design document holding view or index definitions.
    DesignDocument,
    /// A full-text search index definition.
    SearchIndex,
}

impl Display for ChangesetType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangesetType::Documents => write!(f, "DOCUMENTS"),
            ChangesetType::QueryScript => write!(f, "QUERY_SCRIPT"),
            ChangesetType::DesignDocument => write!(f, "DESIGN_DOCUMENT"),
            ChangesetType::SearchIndex => write!(f, "SEARCH_INDEX"),
        }
    }
}

/// Terminal outcome of a changeset as recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangesetStatus {
    Success,
    Failed,
    Skipped,
}

impl Display for ChangesetStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangesetStatus::Success => write!(f, "SUCCESS"),
            ChangesetStatus::Failed => write!(f, "FAILED"),
            ChangesetStatus::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// A changeset found on disk.
///
/// `script` is the entry's file name and is the natural key of the changeset:
/// it is what the ledger records are keyed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changeset {
    changeset_type: ChangesetType,
    version: Version,
    description: String,
    script: String,
    checksum: String,
    path: PathBuf,
}

impl Changeset {
    pub fn new(
        changeset_type: ChangesetType,
        version: Version,
        description: &str,
        script: &str,
        checksum: &str,
        path: PathBuf,
    ) -> Self {
        Changeset {
            changeset_type,
            version,
            description: description.to_string(),
            script: script.to_string(),
            checksum: checksum.to_string(),
            path,
        }
    }

    pub fn changeset_type(&self) -> ChangesetType {
        self.changeset_type
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Display for Changeset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} v{})", self.script, self.changeset_type, self.version)
    }
}
