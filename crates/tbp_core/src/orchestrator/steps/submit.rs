//! Submit step - renders the job descriptor and submits it.
//!
//! Never retried: resubmitting blindly could run the job twice.

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, RunState, StepOutcome};
use crate::scheduler::{write_descriptor, SlurmScheduler};

pub struct SubmitJobStep;

impl SubmitJobStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SubmitJobStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for SubmitJobStep {
    fn name(&self) -> &str {
        "SubmitJob"
    }

    fn description(&self) -> &str {
        "Submit transcription job"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        let template = ctx.settings.descriptor_template_path();
        if !template.is_file() {
            return Err(StepError::file_not_found(template.display().to_string()));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<StepOutcome> {
        let descriptor = write_descriptor(&ctx.settings)?;
        ctx.logger
            .info(&format!("Job descriptor: {}", descriptor.display()));
        state.descriptor_path = Some(descriptor.clone());

        let scheduler = SlurmScheduler::new(&ctx.settings.scheduler, ctx.command_runner());
        ctx.logger.command(&format!(
            "{} {}",
            ctx.settings.scheduler.submit_binary,
            descriptor.display()
        ));
        let job = scheduler.submit(&descriptor)?;

        ctx.logger.success(&format!("Submitted job {}", job.job_id));
        state.job = Some(job);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &RunState) -> StepResult<()> {
        if state.job.is_none() {
            return Err(StepError::invalid_output("No job recorded"));
        }
        Ok(())
    }
}
