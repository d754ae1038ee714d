//! Common types and helpers shared by the engine components.

mod checksum;
mod constants;
mod date_utils;
mod type_utils;
mod version;

pub use checksum::*;
pub use constants::*;
pub use date_utils::*;
pub use type_utils::*;
pub use version::*;
