//! Error types for the orchestrator pipeline.
//!
//! Errors carry context that chains through layers:
//! Run → Step → Operation → Detail

use std::io;

use thiserror::Error;

use crate::publish::PublishError;
use crate::scheduler::SchedulerError;
use crate::workspace::WorkspaceError;

/// Top-level pipeline error with run context.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A step failed during execution.
    #[error("Run '{run_id}' failed at step '{step_name}': {source}")]
    StepFailed {
        run_id: String,
        step_name: String,
        #[source]
        source: StepError,
    },

    /// Settings were rejected before the pipeline started.
    #[error("Run '{run_id}' failed validation: {message}")]
    ValidationFailed { run_id: String, message: String },

    /// Pipeline was cancelled.
    #[error("Run '{run_id}' was cancelled")]
    Cancelled { run_id: String },

    /// Failed to set up the run (logger, directories).
    #[error("Run '{run_id}' setup failed: {message}")]
    SetupFailed { run_id: String, message: String },
}

impl PipelineError {
    /// Create a step failed error.
    pub fn step_failed(
        run_id: impl Into<String>,
        step_name: impl Into<String>,
        source: StepError,
    ) -> Self {
        Self::StepFailed {
            run_id: run_id.into(),
            step_name: step_name.into(),
            source,
        }
    }

    /// Create a validation failed error.
    pub fn validation_failed(run_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            run_id: run_id.into(),
            message: message.into(),
        }
    }

    /// Create a setup failed error.
    pub fn setup_failed(run_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SetupFailed {
            run_id: run_id.into(),
            message: message.into(),
        }
    }

    /// Create a cancelled error.
    pub fn cancelled(run_id: impl Into<String>) -> Self {
        Self::Cancelled {
            run_id: run_id.into(),
        }
    }
}

/// Error from a pipeline step with operation context.
#[derive(Error, Debug)]
pub enum StepError {
    /// Input validation failed.
    #[error("Input validation failed: {0}")]
    InvalidInput(String),

    /// Output validation failed.
    #[error("Output validation failed: {0}")]
    InvalidOutput(String),

    /// An external command failed.
    #[error("{tool} failed with exit code {exit_code}: {message}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    /// File I/O error.
    #[error("I/O error in {operation}: {source}")]
    IoError {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// A required file was not found.
    #[error("Required file not found: {path}")]
    FileNotFound { path: String },

    /// A precondition was not met.
    #[error("Precondition not met: {0}")]
    PreconditionFailed(String),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    /// Generic step error with message.
    #[error("{0}")]
    Other(String),
}

impl StepError {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an invalid output error.
    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    /// Create a command failed error.
    pub fn command_failed(
        tool: impl Into<String>,
        exit_code: i32,
        message: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            tool: tool.into(),
            exit_code,
            message: message.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io_error(operation: impl Into<String>, source: io::Error) -> Self {
        Self::IoError {
            operation: operation.into(),
            source,
        }
    }

    /// Create a file not found error.
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a precondition failed error.
    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::PreconditionFailed(message.into())
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Result type for step operations.
pub type StepResult<T> = Result<T, StepError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_error_displays_context() {
        let err = StepError::command_failed("huggingface-cli", 2, "repository not found");
        let msg = err.to_string();
        assert!(msg.contains("huggingface-cli"));
        assert!(msg.contains("exit code 2"));
        assert!(msg.contains("repository not found"));
    }

    #[test]
    fn pipeline_error_chains_context() {
        let step_err = StepError::from(SchedulerError::UnrecognizedAck {
            output: "queued".into(),
        });
        let pipeline_err = PipelineError::step_failed("run-20250131-140211", "Submit job", step_err);

        let msg = pipeline_err.to_string();
        assert!(msg.contains("run-20250131-140211"));
        assert!(msg.contains("Submit job"));
        assert!(msg.contains("did not contain a job id"));
    }
}
