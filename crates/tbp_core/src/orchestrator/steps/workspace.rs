//! Workspace step - clears input and output staging.
//!
//! Staging integrity is required downstream, so any failure is fatal.

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, RunState, StepOutcome};
use crate::workspace::{ensure_directory, StagingArea};

pub struct PrepareWorkspaceStep;

impl PrepareWorkspaceStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PrepareWorkspaceStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for PrepareWorkspaceStep {
    fn name(&self) -> &str {
        "PrepareWorkspace"
    }

    fn description(&self) -> &str {
        "Clear staging directories"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        if !ctx.settings.working_dir().is_dir() {
            return Err(StepError::file_not_found(
                ctx.settings.working_dir().display().to_string(),
            ));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, _state: &mut RunState) -> StepResult<StepOutcome> {
        let staging = StagingArea::from_settings(&ctx.settings);

        for dir in [&staging.input, &staging.output] {
            let report = staging.clear(dir)?;
            if report.created {
                ctx.logger.info(&format!("Created {}", dir.display()));
            } else {
                ctx.logger.info(&format!(
                    "Cleared {}: {} file(s), {} folder(s) removed",
                    dir.display(),
                    report.files_removed,
                    report.dirs_removed
                ));
            }
        }

        ensure_directory(&ctx.settings.cache_dir())?;
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, ctx: &Context, _state: &RunState) -> StepResult<()> {
        for dir in [ctx.settings.input_dir(), ctx.settings.output_dir()] {
            let empty = std::fs::read_dir(&dir)
                .map_err(|e| StepError::io_error("checking staging", e))?
                .next()
                .is_none();
            if !empty {
                return Err(StepError::invalid_output(format!(
                    "{} is not empty",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}
