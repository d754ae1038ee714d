use super::{execution_error, read_json_object, ChangesetHandler};
use crate::bucket::Bucket;
use crate::changeset::{document_files, Changeset};
use crate::common::{LEDGER_KEY_PREFIX, LOCK_DOCUMENT_KEY};
use crate::errors::{ErrorKind, MoveError, MoveResult};
use std::path::Path;

/// Upserts every json file of a documents changeset, keyed by file stem.
///
/// All files are parsed before the first write, so a malformed file or a key
/// reserved for the ledger or the lock leaves the bucket untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentsHandler;

impl DocumentsHandler {
    fn import(&self, folder: &Path, bucket: &Bucket) -> MoveResult<usize> {
        let mut documents = Vec::new();
        for file in document_files(folder)? {
            let key = document_key(&file)?;
            documents.push((key, read_json_object(&file)?));
        }

        if documents.is_empty() {
            log::warn!("Documents changeset {} holds no json file", folder.display());
        }

        let count = documents.len();
        for (key, content) in documents {
            log::debug!("Upserting document {}", key);
            bucket.upsert(&key, content)?;
        }
        Ok(count)
    }
}

impl ChangesetHandler for DocumentsHandler {
    fn execute(&self, changeset: &Changeset, bucket: &Bucket) -> MoveResult<()> {
        let count = self
            .import(changeset.path(), bucket)
            .map_err(|e| execution_error(changeset, e))?;
        log::info!("Imported {} documents from {}", count, changeset.script());
        Ok(())
    }
}

fn document_key(file: &Path) -> MoveResult<String> {
    let key = file
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| {
            MoveError::new(
                &format!("Cannot derive a document key from {}", file.display()),
                ErrorKind::ValidationError,
            )
        })?;

    if key == LOCK_DOCUMENT_KEY || key.starts_with(LEDGER_KEY_PREFIX) {
        return Err(MoveError::new(
            &format!(
                "Document key {} of {} is reserved for migration bookkeeping",
                key,
                file.display()
            ),
            ErrorKind::ValidationError,
        ));
    }
    Ok(key.to_string())
}
