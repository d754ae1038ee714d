use super::{execution_error, read_json_object, ChangesetHandler};
use crate::bucket::Bucket;
use crate::changeset::Changeset;
use crate::errors::MoveResult;

/// Deploys a full-text search index named after the changeset description.
#[derive(Debug, Default, Clone, Copy)]
pub struct SearchIndexHandler;

impl ChangesetHandler for SearchIndexHandler {
    fn execute(&self, changeset: &Changeset, bucket: &Bucket) -> MoveResult<()> {
        let definition =
            read_json_object(changeset.path()).map_err(|e| execution_error(changeset, e))?;
        bucket
            .upsert_search_index(changeset.description(), definition)
            .map_err(|e| execution_error(changeset, e))?;

        log::info!(
            "Deployed search index '{}' from {}",
            changeset.description(),
            changeset.script()
        );
        Ok(())
    }
}
