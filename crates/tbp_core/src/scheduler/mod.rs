//! Cluster scheduler integration (Slurm).
//!
//! Submission parses the `Submitted batch job <n>` acknowledgement; status
//! is a projection over the live queue (`squeue`) and the accounting
//! history (`sacct`). The orchestrator only observes: it never changes a
//! job's state.

mod descriptor;
mod poller;
mod slurm;
mod status;

pub use descriptor::{descriptor_values, render_descriptor, write_descriptor, RenderedDescriptor};
pub use poller::{JobPoller, Sleeper, ThreadSleeper};
pub use slurm::{parse_job_id, SchedulerJob, SlurmScheduler, StatusProbe, StatusSource};
pub use status::JobStatus;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by scheduler operations.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// The submission command could not run or exited non-zero.
    #[error("Job submission failed: `{command}`: {detail}")]
    Submit { command: String, detail: String },

    /// The submission ran but its output named no job id.
    #[error("Submission output did not contain a job id: {output}")]
    UnrecognizedAck { output: String },

    /// The job descriptor could not be read or written.
    #[error("Job descriptor {path}: {source}")]
    Descriptor {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Polling was interrupted before a terminal status.
    #[error("Monitoring of job {job_id} was interrupted")]
    Interrupted { job_id: String },
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
