//! Pipeline orchestrator for a transcription run.
//!
//! A run is a sequence of steps that validate, execute, and record their
//! results in a [`RunState`]. The failure policy lives here, not in the
//! leaf modules: each step decides whether a problem is fatal, a warning,
//! or a reason to stop early.
//!
//! # Architecture
//!
//! ```text
//! Pipeline
//!     ├── Step: LoadEnvironment   (optional, warns)
//!     ├── Step: PrepareWorkspace  (fatal)
//!     ├── Step: ResolveWorkItems  (zero items halts)
//!     ├── Step: FetchInputs       (per-item non-fatal)
//!     ├── Step: PrepareModels     (required or soft per command)
//!     ├── Step: SubmitJob         (fatal)
//!     ├── Step: MonitorJob        (blocks until terminal)
//!     └── Step: Publish           (gated, fatal)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tbp_core::orchestrator::{build_services, execute_run, Context};
//!
//! let services = build_services(&settings, &CredentialResolver::new(TerminalPrompt))?;
//! let ctx = Context::create(settings, services, None)?;
//! let report = execute_run(&ctx)?;
//! println!("Completed: {:?}", report.result.steps_completed);
//! ```

mod command_log;
mod environment;
mod errors;
mod pipeline;
mod step;
pub mod steps;
mod types;

#[cfg(test)]
pub(crate) mod test_support;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

pub use command_log::LoggedRunner;
pub use environment::{EnvironmentLoader, ModuleLoader, NoopLoader};
pub use errors::{PipelineError, PipelineResult, StepError, StepResult};
pub use pipeline::{CancelHandle, Pipeline, PipelineRunResult};
pub use step::PipelineStep;
pub use steps::{
    FetchInputsStep, LoadEnvironmentStep, MonitorJobStep, PrepareModelsStep,
    PrepareWorkspaceStep, PublishStep, ResolveWorkItemsStep, SubmitJobStep,
};
pub use types::{run_id_for, Context, ProgressCallback, RunState, Services, StepOutcome};

use crate::config::{
    ConfigResult, CredentialResolver, Settings, ShareBackend, GIT_TOKEN_ENV, SHARE_PASSWORD_ENV,
};
use crate::fetch::{MountedShare, RemoteShare, SmbClientShare};
use crate::process::{CommandRunner, ProcessCommandRunner};
use crate::scheduler::ThreadSleeper;
use crate::work_items::HttpSheetSource;

/// Create a standard pipeline with all steps in the correct order.
pub fn create_standard_pipeline() -> Pipeline {
    Pipeline::new()
        .with_step(LoadEnvironmentStep::new())
        .with_step(PrepareWorkspaceStep::new())
        .with_step(ResolveWorkItemsStep::new())
        .with_step(FetchInputsStep::new())
        .with_step(PrepareModelsStep::new())
        .with_step(SubmitJobStep::new())
        .with_step(MonitorJobStep::new())
        .with_step(PublishStep::new())
}

/// Build the production collaborators for `settings`.
///
/// Credentials are resolved here, before anything runs, so a missing token
/// fails the run up front instead of after the compute job.
pub fn build_services(settings: &Settings, credentials: &CredentialResolver) -> ConfigResult<Services> {
    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessCommandRunner);

    let share: Box<dyn RemoteShare> = match settings.share.backend {
        ShareBackend::Smbclient => {
            let password = credentials.resolve(
                settings.share.password.as_deref(),
                SHARE_PASSWORD_ENV,
                "share password",
            )?;
            Box::new(SmbClientShare::new(&settings.share, password, runner.clone()))
        }
        ShareBackend::Mounted => Box::new(MountedShare::new(&settings.share.mount_root)),
    };

    let environment: Box<dyn EnvironmentLoader> = if settings.environment.modules.is_empty() {
        Box::new(NoopLoader)
    } else {
        Box::new(ModuleLoader::from_settings(&settings.environment, runner.clone()))
    };

    let git_token = credentials.resolve(settings.git.token.as_deref(), GIT_TOKEN_ENV, "git token")?;

    Ok(Services {
        sheet: Box::new(HttpSheetSource::from_settings(&settings.sheet)),
        share,
        environment,
        sleeper: Box::new(ThreadSleeper),
        git_token,
        runner,
    })
}

/// Finished run: what the pipeline did and the accumulated state.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub result: PipelineRunResult,
    pub state: RunState,
    /// Where the JSON run summary was written, if it could be.
    pub summary_path: Option<PathBuf>,
}

/// Validate settings, run the standard pipeline and write the run summary.
pub fn execute_run(ctx: &Context) -> PipelineResult<RunReport> {
    execute_pipeline(ctx, create_standard_pipeline())
}

/// Like [`execute_run`] with a caller-built pipeline.
pub fn execute_pipeline(ctx: &Context, pipeline: Pipeline) -> PipelineResult<RunReport> {
    if let Err(problems) = ctx.settings.validate() {
        return Err(PipelineError::validation_failed(&ctx.run_id, problems.join("; ")));
    }

    let pipeline = pipeline.with_cancel_handle(ctx.cancel_handle());
    let mut state = RunState::new(&ctx.run_id);

    ctx.logger.info(&format!(
        "Starting {} ({} steps)",
        ctx.run_id,
        pipeline.step_count()
    ));

    let outcome = pipeline.run(ctx, &mut state);

    ctx.logger.section("Run summary");
    for line in state.summary_lines() {
        ctx.logger.info(&line);
    }
    let summary_path = write_summary(ctx, &state);
    ctx.logger.flush();

    let result = outcome?;
    Ok(RunReport {
        result,
        state,
        summary_path,
    })
}

/// Write `<logs_dir>/<run_id>.json`. Failure only warns.
fn write_summary(ctx: &Context, state: &RunState) -> Option<PathBuf> {
    let logs_dir = ctx.settings.logs_dir();
    let path = logs_dir.join(format!("{}.json", ctx.run_id));
    let written = serde_json::to_string_pretty(state)
        .map_err(|e| e.to_string())
        .and_then(|json| {
            fs::create_dir_all(&logs_dir)
                .and_then(|_| fs::write(&path, json))
                .map_err(|e| e.to_string())
        });

    match written {
        Ok(()) => Some(path),
        Err(e) => {
            ctx.logger
                .warn(&format!("Could not write run summary {}: {}", path.display(), e));
            None
        }
    }
}
