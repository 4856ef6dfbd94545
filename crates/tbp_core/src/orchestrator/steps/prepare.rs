//! Prepare step - makes model and language data available before submit.
//!
//! Each configured command is either required (failure ends the run) or a
//! soft prerequisite (failure is a warning).

use crate::config::PreparationCommand;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, RunState, StepOutcome};
use crate::process::{run_captured, CommandSpec};
use crate::workspace::ensure_directory;

pub struct PrepareModelsStep;

impl PrepareModelsStep {
    pub fn new() -> Self {
        Self
    }

    fn spec(ctx: &Context, command: &PreparationCommand) -> CommandSpec {
        let settings = &ctx.settings;
        CommandSpec::new(&command.program)
            .args(command.args.iter().map(String::as_str))
            .current_dir(settings.working_dir())
            .env("HF_HOME", settings.hf_cache_dir().display().to_string())
            .env("NLTK_DATA", settings.nltk_cache_dir().display().to_string())
            .env("WHISPER_MODEL", settings.preparation.model.clone())
            .env("ALIGN_LANGUAGES", settings.preparation.alignment_languages.join(","))
    }

    /// Run one command; `Err` carries (exit code, detail).
    fn run_one(ctx: &Context, command: &PreparationCommand) -> Result<(), (i32, String)> {
        let spec = Self::spec(ctx, command);
        ctx.logger.command(&spec.display());

        // Spawn failures have no exit code.
        let output =
            run_captured(ctx.command_runner().as_ref(), &spec).map_err(|e| (-1, e.to_string()))?;

        if output.success() {
            Ok(())
        } else {
            Err((output.exit_code, output.detail()))
        }
    }
}

impl Default for PrepareModelsStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for PrepareModelsStep {
    fn name(&self) -> &str {
        "PrepareModels"
    }

    fn description(&self) -> &str {
        "Prepare models and language data"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<StepOutcome> {
        let settings = &ctx.settings;
        ensure_directory(&settings.hf_cache_dir())?;
        ensure_directory(&settings.nltk_cache_dir())?;

        let commands = &settings.preparation.commands;
        if commands.is_empty() {
            return Ok(StepOutcome::Skipped(
                "no preparation commands configured".to_string(),
            ));
        }

        ctx.logger.info(&format!(
            "Model {}, alignment languages {}",
            settings.preparation.model,
            settings.preparation.alignment_languages.join(", ")
        ));

        for command in commands {
            ctx.logger.section(&command.name);
            match Self::run_one(ctx, command) {
                Ok(()) => ctx.logger.success(&format!("{} done", command.name)),
                Err((code, detail)) if command.required => {
                    return Err(StepError::command_failed(&command.name, code, detail));
                }
                Err((code, detail)) => {
                    let message = format!(
                        "{} failed (exit code {}), continuing: {}",
                        command.name, code, detail
                    );
                    ctx.logger.warn(&message);
                    state.warn(message);
                }
            }
        }
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, _state: &RunState) -> StepResult<()> {
        Ok(())
    }
}
