//! Executors for the four changeset types.
//!
//! Every handler applies one changeset to a bucket and reports any failure as
//! an `ExecutionError` whose cause is the underlying store or IO error. The
//! orchestrator picks the handler with an exhaustive match on
//! [`ChangesetType`](crate::changeset::ChangesetType), so a new type cannot be
//! added without wiring its handler.
//!
//! Documents, design documents and search indexes are written with replace
//! semantics and can be re-applied safely. Query scripts run statement by
//! statement; a script failing half way stays half applied.

mod design_document;
mod documents;
mod query_script;
mod search_index;

pub use design_document::*;
pub use documents::*;
pub use query_script::*;
pub use search_index::*;

use crate::bucket::Bucket;
use crate::changeset::Changeset;
use crate::errors::{ErrorKind, MoveError, MoveResult};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Applies a changeset to a bucket.
pub trait ChangesetHandler {
    /// # Errors
    ///
    /// `ExecutionError` wrapping the underlying failure.
    fn execute(&self, changeset: &Changeset, bucket: &Bucket) -> MoveResult<()>;
}

pub(crate) fn execution_error(changeset: &Changeset, cause: MoveError) -> MoveError {
    MoveError::new_with_cause(
        &format!("Failed to apply {}: {}", changeset.script(), cause),
        ErrorKind::ExecutionError,
        cause,
    )
}

/// Reads a json file that must hold an object.
pub(crate) fn read_json_object(path: &Path) -> MoveResult<Value> {
    let content = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content).map_err(|e| {
        MoveError::new(
            &format!("Invalid json in {}: {}", path.display(), e),
            ErrorKind::EncodingError,
        )
    })?;

    if !value.is_object() {
        return Err(MoveError::new(
            &format!("{} must contain a json object", path.display()),
            ErrorKind::ValidationError,
        ));
    }
    Ok(value)
}
