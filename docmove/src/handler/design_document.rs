use super::{execution_error, read_json_object, ChangesetHandler};
use crate::bucket::Bucket;
use crate::changeset::Changeset;
use crate::errors::MoveResult;

/// Deploys a design document named after the changeset description.
///
/// An existing design document of the same name is replaced as a whole.
#[derive(Debug, Default, Clone, Copy)]
pub struct DesignDocumentHandler;

impl ChangesetHandler for DesignDocumentHandler {
    fn execute(&self, changeset: &Changeset, bucket: &Bucket) -> MoveResult<()> {
        let definition =
            read_json_object(changeset.path()).map_err(|e| execution_error(changeset, e))?;
        bucket
            .upsert_design_document(changeset.description(), definition)
            .map_err(|e| execution_error(changeset, e))?;

        log::info!(
            "Deployed design document '{}' from {}",
            changeset.description(),
            changeset.script()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::memory::InMemoryBucket;
    use crate::changeset::ChangesetLocator;
    use crate::errors::ErrorKind;
    use serde_json::json;
    use std::fs;

    #[test]
    fn test_deploys_and_replaces_design_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("V1__user.json");
        fs::write(&path, r#"{"views": {"by_name": {"map": "function (doc) {}"}}}"#).unwrap();
        let bucket = Bucket::new(InMemoryBucket::new("default"));

        let changeset = ChangesetLocator::new(dir.path()).locate().unwrap().remove(0);
        DesignDocumentHandler.execute(&changeset, &bucket).unwrap();
        assert_eq!(
            bucket.get_design_document("user").unwrap().unwrap()["views"]["by_name"]["map"],
            json!("function (doc) {}")
        );

        fs::write(&path, r#"{"views": {}}"#).unwrap();
        let changeset = ChangesetLocator::new(dir.path()).locate().unwrap().remove(0);
        DesignDocumentHandler.execute(&changeset, &bucket).unwrap();
        assert_eq!(
            bucket.get_design_document("user").unwrap(),
            Some(json!({"views": {}}))
        );
    }

    #[test]
    fn test_rejects_non_object_definition() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("V1__user.json"), "[1, 2]").unwrap();
        let bucket = Bucket::new(InMemoryBucket::new("default"));

        let changeset = ChangesetLocator::new(dir.path()).locate().unwrap().remove(0);
        let err = DesignDocumentHandler.execute(&changeset, &bucket).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ExecutionError);
        assert!(bucket.get_design_document("user").unwrap().is_none());
    }
}
