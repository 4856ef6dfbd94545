//! Monitor step - blocks until the submitted job reaches a terminal status.

use std::time::Duration;

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, RunState, StepOutcome};
use crate::scheduler::{JobPoller, SlurmScheduler, StatusSource};

pub struct MonitorJobStep;

impl MonitorJobStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MonitorJobStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for MonitorJobStep {
    fn name(&self) -> &str {
        "MonitorJob"
    }

    fn description(&self) -> &str {
        "Monitor job status"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<StepOutcome> {
        let Some(job) = state.job.as_mut() else {
            return Err(StepError::precondition_failed("no job was submitted"));
        };

        let interval = Duration::from_secs(ctx.settings.scheduler.poll_interval_secs);
        ctx.logger.info(&format!(
            "Monitoring job {} every {} minute(s)",
            job.job_id,
            interval.as_secs().div_ceil(60)
        ));

        let scheduler = SlurmScheduler::new(&ctx.settings.scheduler, ctx.services.runner.clone());
        let poller = JobPoller::new(&scheduler, ctx.services.sleeper.as_ref(), interval)
            .with_cancel(ctx.cancel_handle());

        let logger = &ctx.logger;
        let job_id = job.job_id.clone();
        let mut unverified = false;
        let status = poller.wait(job, |probe| {
            let via = match probe.source {
                StatusSource::LiveQueue => "queue",
                StatusSource::Accounting => "accounting",
                StatusSource::Assumed { queries_failed } => {
                    unverified = queries_failed;
                    "assumed"
                }
            };
            logger.info(&format!("Job {} is {} ({})", job_id, probe.status, via));
        })?;

        if unverified {
            let message = format!(
                "job {} status could not be queried; COMPLETED is assumed, not confirmed",
                job_id
            );
            ctx.logger.warn(&message);
            state.warn(message);
        }

        ctx.logger
            .info(&format!("Job {} finished with status {}", job_id, status));
        state.terminal_status = Some(status);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &RunState) -> StepResult<()> {
        match state.terminal_status {
            Some(status) if status.is_terminal() => Ok(()),
            _ => Err(StepError::invalid_output("no terminal job status recorded")),
        }
    }
}
