mod bucket;
mod query;

pub use bucket::*;
