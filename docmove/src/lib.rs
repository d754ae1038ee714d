//! # docmove - versioned changeset migrations for document databases
//!
//! docmove applies an ordered catalogue of changesets stored on disk to a
//! document bucket, exactly once each, and records what it applied in the
//! bucket itself.
//!
//! ## Key Features
//!
//! - **Four changeset types**: document folders, query scripts, design
//!   documents and full-text search indexes
//! - **Drift detection**: a changeset edited after being applied stops the run
//!   before anything is written
//! - **Single writer**: a lock document guarantees that only one deployer
//!   migrates a bucket at a time
//! - **Resumable**: a run halted by a failure resumes from the first
//!   unapplied changeset once the cause is fixed
//! - **Pluggable store**: the engine only depends on the [`bucket::BucketProvider`]
//!   contract; [`bucket::memory::InMemoryBucket`] implements it in-process
//!
//! ## Quick Start
//!
//! ```text
//! db/migration/
//! ├── V0__create_indexes.n1ql
//! ├── V0.1__insert_users/
//! │   ├── titi.json
//! │   └── toto.json
//! ├── V1__user_views.json
//! └── V2__user_search.fts
//! ```
//!
//! ```rust,no_run
//! use docmove::bucket::Bucket;
//! use docmove::bucket::memory::InMemoryBucket;
//! use docmove::migration_builder::MigrationBuilder;
//!
//! # fn main() -> Result<(), docmove::errors::MoveError> {
//! let bucket = Bucket::new(InMemoryBucket::new("default"));
//! let report = MigrationBuilder::new(bucket)
//!     .changesets_path("db/migration")
//!     .build()?
//!     .migrate()?;
//!
//! for outcome in report.outcomes() {
//!     println!("{}", outcome);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`bucket`] - The database contract and its in-memory implementation
//! - [`changeset`] - Changeset descriptors and the on-disk locator
//! - [`common`] - Versions, checksums, constants and small utilities
//! - [`errors`] - Error types and result definitions
//! - [`handler`] - One executor per changeset type
//! - [`ledger`] - Applied-changeset records stored in the bucket
//! - [`lock`] - The migration lock
//! - [`migration_builder`] - Builder for a configured orchestrator
//! - [`migration_config`] - Run settings
//! - [`orchestrator`] - The migration run state machine

pub mod bucket;
pub mod changeset;
pub mod common;
pub mod errors;
pub mod handler;
pub mod ledger;
pub mod lock;
pub mod migration_builder;
pub mod migration_config;
pub mod orchestrator;
