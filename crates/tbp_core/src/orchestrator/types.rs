//! Core types for the orchestrator pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::command_log::LoggedRunner;
use super::environment::EnvironmentLoader;
use super::errors::{PipelineError, PipelineResult};
use super::pipeline::CancelHandle;
use crate::config::{Secret, Settings};
use crate::fetch::{FetchSummary, RemoteShare};
use crate::logging::{LogCallback, LogConfig, RunLogger};
use crate::process::CommandRunner;
use crate::publish::PublishOutcome;
use crate::scheduler::{JobStatus, SchedulerJob, Sleeper};
use crate::work_items::{SheetSource, WorkItem};

/// Progress callback type for reporting pipeline progress.
///
/// Arguments: (step_name, percent_complete, message)
pub type ProgressCallback = Box<dyn Fn(&str, u32, &str) + Send + Sync>;

/// External collaborators a run talks to.
pub struct Services {
    /// Runs every external tool (sbatch, squeue, sacct, git, loaders).
    pub runner: Arc<dyn CommandRunner>,
    pub sheet: Box<dyn SheetSource>,
    pub share: Box<dyn RemoteShare>,
    pub environment: Box<dyn EnvironmentLoader>,
    pub sleeper: Box<dyn Sleeper>,
    /// Token for the git host, resolved before the run starts.
    pub git_token: Secret,
}

/// Read-only context passed to pipeline steps.
///
/// Contains run configuration and shared resources that steps can read
/// but not modify. Mutable state goes in `RunState`.
pub struct Context {
    /// Application settings.
    pub settings: Settings,
    /// Run identifier, also the log file name.
    pub run_id: String,
    /// When the run started. Names the publish branch.
    pub started_at: DateTime<Local>,
    /// Per-run logger.
    pub logger: Arc<RunLogger>,
    pub services: Services,
    cancel: CancelHandle,
    /// Optional progress callback.
    progress_callback: Option<ProgressCallback>,
}

impl Context {
    /// Create a new context for a run.
    pub fn new(
        settings: Settings,
        run_id: impl Into<String>,
        started_at: DateTime<Local>,
        logger: Arc<RunLogger>,
        services: Services,
    ) -> Self {
        Self {
            settings,
            run_id: run_id.into(),
            started_at,
            logger,
            services,
            cancel: CancelHandle::new(),
            progress_callback: None,
        }
    }

    /// Create a context whose logger writes `<logs_dir>/<run_id>.log`.
    pub fn create(
        settings: Settings,
        services: Services,
        callback: Option<LogCallback>,
    ) -> PipelineResult<Self> {
        let started_at = Local::now();
        let run_id = run_id_for(&started_at);

        let log_config = LogConfig {
            level: settings.logging.level,
            compact: settings.logging.compact,
            error_tail: settings.logging.error_tail as usize,
            ..LogConfig::default()
        };
        let logger = RunLogger::new(&run_id, settings.logs_dir(), log_config, callback)
            .map_err(|e| PipelineError::setup_failed(&run_id, format!("cannot open run log: {}", e)))?;

        Ok(Self::new(settings, run_id, started_at, Arc::new(logger), services))
    }

    /// Set the progress callback.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Report progress to callback (if set).
    pub fn report_progress(&self, step_name: &str, percent: u32, message: &str) {
        if let Some(ref callback) = self.progress_callback {
            callback(step_name, percent, message);
        }
    }

    /// The services runner, with captured output recorded in the run log.
    pub fn command_runner(&self) -> Arc<dyn CommandRunner> {
        Arc::new(LoggedRunner::new(
            self.services.runner.clone(),
            self.logger.clone(),
        ))
    }

    /// Handle that stops the run at the next step boundary and interrupts
    /// job monitoring.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

/// `run-YYYYmmdd-HHMMSS`
pub fn run_id_for(at: &DateTime<Local>) -> String {
    format!("run-{}", at.format("%Y%m%d-%H%M%S"))
}

/// Mutable run state that accumulates results from pipeline steps.
///
/// Each step's output is stored in its own section; serialized as the run
/// summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: String,
    pub started_at: Option<String>,
    /// Work items resolved from the sheet.
    #[serde(default)]
    pub work_items: Vec<WorkItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch: Option<FetchSummary>,
    /// Rendered job descriptor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptor_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<SchedulerJob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishOutcome>,
    /// Non-fatal problems, in order.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Why the run stopped early without failing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted: Option<String>,
}

impl RunState {
    /// Create a new run state with the given ID.
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: Some(Local::now().to_rfc3339()),
            ..Default::default()
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job.as_ref().map(|j| j.job_id.as_str())
    }

    /// Human-readable summary lines.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("Run {}", self.run_id)];
        lines.push(format!("Work items: {}", self.work_items.len()));
        if let Some(fetch) = &self.fetch {
            lines.extend(fetch.to_string().lines().map(String::from));
        }
        if let Some(job) = &self.job {
            lines.push(format!("Job {}: {}", job.job_id, job.status));
        }
        match &self.publish {
            Some(PublishOutcome::Pushed { branch, files, .. }) => {
                lines.push(format!("Published {} file(s) on {}", files.len(), branch))
            }
            Some(PublishOutcome::NoChanges { branch }) => {
                lines.push(format!("Nothing new to publish ({})", branch))
            }
            None => {}
        }
        if let Some(reason) = &self.halted {
            lines.push(format!("Stopped early: {}", reason));
        }
        for warning in &self.warnings {
            lines.push(format!("Warning: {}", warning));
        }
        lines
    }
}

/// Result of executing a pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Step completed successfully.
    Success,
    /// Step was skipped (preconditions not met, but not an error).
    Skipped(String),
    /// Nothing left to do; end the run successfully after this step.
    Halt(String),
}
