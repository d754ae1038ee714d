use crate::changeset::{Changeset, ChangesetStatus, ChangesetType};
use crate::common::Version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A ledger entry as persisted in the bucket.
///
/// `status` is absent while the changeset is executing; a record that is still
/// without status when the ledger is loaded belongs to an interrupted run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    pub script: String,
    pub version: Version,
    pub description: String,
    #[serde(rename = "type")]
    pub changeset_type: ChangesetType,
    pub checksum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ChangesetStatus>,
    #[serde(default)]
    pub applied_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LedgerRecord {
    pub(crate) fn from_changeset(changeset: &Changeset) -> Self {
        LedgerRecord {
            script: changeset.script().to_string(),
            version: changeset.version().clone(),
            description: changeset.description().to_string(),
            changeset_type: changeset.changeset_type(),
            checksum: changeset.checksum().to_string(),
            status: None,
            applied_at: None,
            duration_ms: None,
            runner: None,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Some(ChangesetStatus::Success)
    }

    pub fn is_failed(&self) -> bool {
        self.status == Some(ChangesetStatus::Failed)
    }

    pub fn is_skipped(&self) -> bool {
        self.status == Some(ChangesetStatus::Skipped)
    }

    /// `true` when the record was started but never reached a terminal status.
    pub fn is_interrupted(&self) -> bool {
        self.status.is_none()
    }
}
