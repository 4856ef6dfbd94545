//! Resolve step - reads pending work items from the sheet.
//!
//! An unreachable or malformed sheet, like an empty work list, ends the run
//! early without failing it.

use crate::orchestrator::errors::StepResult;
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, RunState, StepOutcome};
use crate::work_items::{self, ResolveOptions};

pub struct ResolveWorkItemsStep;

impl ResolveWorkItemsStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ResolveWorkItemsStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for ResolveWorkItemsStep {
    fn name(&self) -> &str {
        "ResolveWorkItems"
    }

    fn description(&self) -> &str {
        "Resolve incomplete work items"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<StepOutcome> {
        let source = ctx.services.sheet.as_ref();
        ctx.logger
            .info(&format!("Reading work list from {}", source.describe()));

        let options = ResolveOptions::from(&ctx.settings.sheet);
        let items = match work_items::resolve(source, &options) {
            Ok(items) => items,
            Err(e) => {
                ctx.logger.error(&e.to_string());
                return Ok(StepOutcome::Halt(format!("work list unavailable: {}", e)));
            }
        };

        for item in &items {
            if item.verified {
                ctx.logger.info(&format!("  {}", item.identifier));
            } else {
                ctx.logger
                    .warn(&format!("  {} (label not in <n>_<n> form)", item.identifier));
            }
        }
        ctx.logger
            .info(&format!("Found {} incomplete work item(s)", items.len()));

        let empty = items.is_empty();
        state.work_items = items;
        if empty {
            return Ok(StepOutcome::Halt("no incomplete work items".to_string()));
        }
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, _state: &RunState) -> StepResult<()> {
        Ok(())
    }
}
