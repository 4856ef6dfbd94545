//! Fetch step - copies each work item's folder into input staging.
//!
//! Per-item failures are recorded, not fatal.

use crate::fetch::RemoteFetcher;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, RunState, StepOutcome};

pub struct FetchInputsStep;

impl FetchInputsStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FetchInputsStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for FetchInputsStep {
    fn name(&self) -> &str {
        "FetchInputs"
    }

    fn description(&self) -> &str {
        "Fetch audio from remote share"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        if !ctx.settings.input_dir().is_dir() {
            return Err(StepError::invalid_input("input staging directory is missing"));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<StepOutcome> {
        let share = ctx.services.share.as_ref();
        ctx.logger.info(&format!(
            "Fetching {} item(s) from {}",
            state.work_items.len(),
            share.describe()
        ));

        let fetcher = RemoteFetcher::new(
            share,
            &ctx.settings.share.base_path,
            ctx.settings.input_dir(),
        );
        let summary = fetcher.fetch_all(&state.work_items);

        for line in summary.to_string().lines() {
            ctx.logger.info(line);
        }
        for id in summary.transfer_errors() {
            state.warn(format!("transfer error while fetching {}", id));
        }
        for id in summary.not_found() {
            state.warn(format!("{} not found on share", id));
        }

        let nothing_fetched = summary.files_copied() == 0;
        state.fetch = Some(summary);

        if nothing_fetched {
            return Ok(StepOutcome::Halt(
                "no input files were fetched; nothing to transcribe".to_string(),
            ));
        }
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &RunState) -> StepResult<()> {
        if state.fetch.is_none() {
            return Err(StepError::invalid_output("fetch summary not recorded"));
        }
        Ok(())
    }
}
