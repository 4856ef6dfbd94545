//! TBP Core - Backend logic for the transcription batch pipeline
//!
//! This crate contains the orchestration logic with zero CLI dependencies:
//! work-item resolution from a spreadsheet, remote share fetch, staging
//! workspace management, Slurm submission and polling, and publishing the
//! outputs to a git host. It can be driven by the `tbp` binary or embedded.

pub mod config;
pub mod fetch;
pub mod logging;
pub mod orchestrator;
pub mod process;
pub mod publish;
pub mod scheduler;
pub mod work_items;
pub mod workspace;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_returns_value() {
        assert!(!version().is_empty());
    }
}
