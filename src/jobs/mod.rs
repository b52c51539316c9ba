//! Background jobs for long-running commands

mod reaper;
mod registry;

pub use reaper::JobReaper;
pub use registry::{JobConfig, JobKind, JobRecord, JobRegistry};
#[cfg(test)]
pub use registry::JobStatus;
