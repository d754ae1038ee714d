//! The ledger: applied-changeset records stored in the target bucket itself.
//!
//! One document per changeset, keyed `changelog::<script>`. Each write is a
//! single-document upsert, atomic per record but not across a batch, so a
//! crash can leave a record without a terminal status. Such records are loaded
//! as interrupted and surfaced to the orchestrator, never treated as applied.

mod ledger;
mod record;

pub use ledger::*;
pub use record::*;
