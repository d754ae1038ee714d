mod orchestrator;
mod report;

pub use orchestrator::*;
pub use report::*;
