//! The database contract the engine runs against.
//!
//! The engine never talks to a driver directly. Everything it needs from the
//! target database goes through [`BucketProvider`]:
//! - keyed document reads and writes, including insert-if-absent and
//!   compare-and-swap writes used by the migration lock
//! - key-prefix scans used to load the ledger
//! - execution of the store's native query language
//! - deployment of design documents and full-text search indexes
//!
//! [`memory::InMemoryBucket`] is a complete in-process implementation, used by
//! the tests and by callers that embed the engine.

mod bucket;
pub mod memory;

pub use bucket::*;
