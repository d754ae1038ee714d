//! Changesets: the units of migration discovered on disk.
//!
//! A changeset is a file or a folder under the changesets root whose name follows
//! `V<version>__<description>[.ext]`. The extension decides how it is applied:
//!
//! | Entry            | Type                                   |
//! |------------------|----------------------------------------|
//! | directory        | [`ChangesetType::Documents`]           |
//! | `*.n1ql`         | [`ChangesetType::QueryScript`]         |
//! | `*.json`         | [`ChangesetType::DesignDocument`]      |
//! | `*.fts`          | [`ChangesetType::SearchIndex`]         |
//!
//! Changesets are rebuilt from disk on every run by the [`ChangesetLocator`];
//! nothing about them is cached between runs.

mod changeset;
mod locator;

pub use changeset::*;
pub use locator::*;
