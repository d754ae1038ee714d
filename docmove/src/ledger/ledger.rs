use super::LedgerRecord;
use crate::bucket::Bucket;
use crate::changeset::{Changeset, ChangesetStatus};
use crate::common::{now_utc, LEDGER_KEY_PREFIX};
use crate::errors::{ErrorKind, MoveError, MoveResult};
use std::collections::BTreeMap;

/// Reads and writes ledger records in a bucket.
///
/// The ledger never deletes records. Writing over a `SUCCESS` record is refused,
/// which keeps the checksum recorded at application time intact.
#[derive(Clone)]
pub struct Ledger {
    bucket: Bucket,
    runner: String,
}

impl Ledger {
    /// Creates a ledger writing records on behalf of `runner`.
    pub fn new(bucket: Bucket, runner: &str) -> Self {
        Ledger {
            bucket,
            runner: runner.to_string(),
        }
    }

    /// Loads every record, keyed by script.
    ///
    /// Records left without status by a crashed run are returned as they are;
    /// see [`LedgerRecord::is_interrupted`].
    ///
    /// # Errors
    ///
    /// `EncodingError` if a record cannot be decoded.
    pub fn load_applied(&self) -> MoveResult<BTreeMap<String, LedgerRecord>> {
        let mut records = BTreeMap::new();
        for document in self.bucket.scan_prefix(LEDGER_KEY_PREFIX)? {
            let record: LedgerRecord =
                serde_json::from_value(document.content).map_err(|e| {
                    MoveError::new(
                        &format!("Corrupted ledger record '{}': {}", document.key, e),
                        ErrorKind::EncodingError,
                    )
                })?;
            records.insert(record.script.clone(), record);
        }
        log::debug!("Loaded {} ledger records", records.len());
        Ok(records)
    }

    /// Reads the record of a single script.
    pub fn record(&self, script: &str) -> MoveResult<Option<LedgerRecord>> {
        match self.bucket.get(&ledger_key(script))? {
            Some(document) => Ok(Some(serde_json::from_value(document.content)?)),
            None => Ok(None),
        }
    }

    /// Writes the in-flight record of a changeset about to be executed.
    ///
    /// # Errors
    ///
    /// `ValidationError` if the changeset is already recorded as `SUCCESS`.
    pub fn record_start(&self, changeset: &Changeset) -> MoveResult<()> {
        if let Some(existing) = self.record(changeset.script())? {
            if existing.is_success() {
                return Err(MoveError::new(
                    &format!(
                        "Changeset {} is already recorded as applied",
                        changeset.script()
                    ),
                    ErrorKind::ValidationError,
                ));
            }
        }

        let mut record = LedgerRecord::from_changeset(changeset);
        record.applied_at = Some(now_utc());
        record.runner = Some(self.runner.clone());
        self.write(&record)
    }

    pub fn record_success(&self, changeset: &Changeset, duration_ms: u64) -> MoveResult<()> {
        self.record_outcome(changeset, ChangesetStatus::Success, Some(duration_ms), None)
    }

    pub fn record_failure(
        &self,
        changeset: &Changeset,
        error: &MoveError,
        duration_ms: u64,
    ) -> MoveResult<()> {
        self.record_outcome(
            changeset,
            ChangesetStatus::Failed,
            Some(duration_ms),
            Some(error.to_string()),
        )
    }

    /// Records a changeset that was passed over without being executed.
    pub fn record_skipped(&self, changeset: &Changeset) -> MoveResult<()> {
        self.record_outcome(changeset, ChangesetStatus::Skipped, None, None)
    }

    fn record_outcome(
        &self,
        changeset: &Changeset,
        status: ChangesetStatus,
        duration_ms: Option<u64>,
        error: Option<String>,
    ) -> MoveResult<()> {
        let applied_at = match self.record(changeset.script())? {
            Some(existing) if existing.is_success() => {
                return Err(MoveError::new(
                    &format!(
                        "Changeset {} is already recorded as applied",
                        changeset.script()
                    ),
                    ErrorKind::ValidationError,
                ));
            }
            Some(existing) => existing.applied_at,
            None => None,
        };

        let mut record = LedgerRecord::from_changeset(changeset);
        record.status = Some(status);
        record.applied_at = applied_at.or_else(|| Some(now_utc()));
        record.duration_ms = duration_ms;
        record.runner = Some(self.runner.clone());
        record.error = error;
        self.write(&record)
    }

    fn write(&self, record: &LedgerRecord) -> MoveResult<()> {
        let content = serde_json::to_value(record)?;
        self.bucket.upsert(&ledger_key(&record.script), content)?;
        Ok(())
    }
}

pub(crate) fn ledger_key(script: &str) -> String {
    format!("{}{}", LEDGER_KEY_PREFIX, script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::memory::InMemoryBucket;
    use crate::changeset::ChangesetType;
    use crate::common::Version;
    use serde_json::json;
    use std::path::PathBuf;

    fn changeset(script: &str, version: &str, checksum: &str) -> Changeset {
        Changeset::new(
            ChangesetType::QueryScript,
            Version::parse(version).unwrap(),
            "test",
            script,
            checksum,
            PathBuf::from(script),
        )
    }

    fn ledger() -> (Ledger, Bucket) {
        let bucket = Bucket::new(InMemoryBucket::new("default"));
        (Ledger::new(bucket.clone(), "runner-1"), bucket)
    }

    #[test]
    fn test_empty_ledger() {
        let (ledger, _) = ledger();
        assert!(ledger.load_applied().unwrap().is_empty());
    }

    #[test]
    fn test_start_then_success() {
        let (ledger, _) = ledger();
        let cs = changeset("V1__a.n1ql", "1", "c1");

        ledger.record_start(&cs).unwrap();
        let started = ledger.record("V1__a.n1ql").unwrap().unwrap();
        assert!(started.is_interrupted());
        assert_eq!(started.runner.as_deref(), Some("runner-1"));

        ledger.record_success(&cs, 42).unwrap();
        let applied = ledger.load_applied().unwrap();
        let record = &applied["V1__a.n1ql"];
        assert!(record.is_success());
        assert_eq!(record.duration_ms, Some(42));
        assert_eq!(record.checksum, "c1");
        assert_eq!(record.applied_at, started.applied_at);
    }

    #[test]
    fn test_failure_keeps_error_message() {
        let (ledger, _) = ledger();
        let cs = changeset("V1__a.n1ql", "1", "c1");
        ledger.record_start(&cs).unwrap();
        ledger
            .record_failure(&cs, &MoveError::new("boom", ErrorKind::ExecutionError), 3)
            .unwrap();

        let record = ledger.record("V1__a.n1ql").unwrap().unwrap();
        assert!(record.is_failed());
        assert_eq!(record.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_failed_record_can_be_restarted() {
        let (ledger, _) = ledger();
        let cs = changeset("V1__a.n1ql", "1", "c1");
        ledger.record_start(&cs).unwrap();
        ledger
            .record_failure(&cs, &MoveError::new("boom", ErrorKind::ExecutionError), 3)
            .unwrap();

        let fixed = changeset("V1__a.n1ql", "1", "c2");
        ledger.record_start(&fixed).unwrap();
        ledger.record_success(&fixed, 1).unwrap();

        let record = ledger.record("V1__a.n1ql").unwrap().unwrap();
        assert!(record.is_success());
        assert_eq!(record.checksum, "c2");
        assert!(record.error.is_none());
    }

    #[test]
    fn test_success_record_is_never_replaced() {
        let (ledger, _) = ledger();
        let cs = changeset("V1__a.n1ql", "1", "c1");
        ledger.record_success(&cs, 1).unwrap();

        let edited = changeset("V1__a.n1ql", "1", "c2");
        let err = ledger.record_start(&edited).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
        let err = ledger.record_success(&edited, 1).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);

        assert_eq!(ledger.record("V1__a.n1ql").unwrap().unwrap().checksum, "c1");
    }

    #[test]
    fn test_skipped() {
        let (ledger, _) = ledger();
        let cs = changeset("V0.5__late.n1ql", "0.5", "c1");
        ledger.record_skipped(&cs).unwrap();
        let record = ledger.record("V0.5__late.n1ql").unwrap().unwrap();
        assert!(record.is_skipped());
        assert!(record.duration_ms.is_none());
    }

    #[test]
    fn test_load_ignores_other_documents() {
        let (ledger, bucket) = ledger();
        bucket.upsert("user::1", json!({"name": "titi"})).unwrap();
        ledger.record_success(&changeset("V1__a.n1ql", "1", "c1"), 1).unwrap();
        assert_eq!(ledger.load_applied().unwrap().len(), 1);
    }

    #[test]
    fn test_load_fails_on_corrupted_record() {
        let (ledger, bucket) = ledger();
        bucket.upsert("changelog::broken", json!({"script": 1})).unwrap();
        let err = ledger.load_applied().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::EncodingError);
    }
}
