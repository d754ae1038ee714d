//! Single-writer coordination across processes.
//!
//! The migration lock is one document at a well-known key. Acquisition relies
//! on the bucket's insert-if-absent guarantee and on compare-and-swap writes,
//! so two deployers racing for the lock can never both win.

mod coordinator;
mod guard;

pub use coordinator::*;
pub use guard::*;
