//! Environment step - loads HPC environment modules.
//!
//! Best-effort: a failure is reported as a warning and the run goes on.

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, RunState, StepOutcome};

pub struct LoadEnvironmentStep;

impl LoadEnvironmentStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoadEnvironmentStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for LoadEnvironmentStep {
    fn name(&self) -> &str {
        "LoadEnvironment"
    }

    fn description(&self) -> &str {
        "Load environment modules"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, _state: &mut RunState) -> StepResult<StepOutcome> {
        let modules = &ctx.settings.environment.modules;
        if modules.is_empty() {
            return Ok(StepOutcome::Skipped("no modules configured".to_string()));
        }

        let loader = &ctx.services.environment;
        ctx.logger.command(&format!("{} {}", loader.describe(), modules.join(" ")));
        loader
            .load(modules)
            .map_err(|e| StepError::other(format!("module load failed: {}", e)))?;

        ctx.logger.info(&format!("Loaded {} module(s)", modules.len()));
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, _state: &RunState) -> StepResult<()> {
        Ok(())
    }

    fn is_optional(&self) -> bool {
        true
    }
}
