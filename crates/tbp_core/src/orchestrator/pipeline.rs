//! Pipeline runner that executes steps in sequence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::errors::{PipelineError, PipelineResult};
use super::step::PipelineStep;
use super::types::{Context, RunState, StepOutcome};
use crate::logging::StageStatus;

/// Pipeline that runs a sequence of steps.
///
/// The pipeline executes steps in order, running validation before
/// and after each step. Required steps fail the run; optional steps
/// downgrade their failure to a warning. A step may also halt the run
/// early without failing it.
pub struct Pipeline {
    /// Steps to execute in order.
    steps: Vec<Box<dyn PipelineStep>>,
    /// Cancellation flag.
    cancelled: Arc<AtomicBool>,
}

impl Pipeline {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Add a step to the pipeline.
    pub fn add_step<S: PipelineStep + 'static>(&mut self, step: S) -> &mut Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Add a step (builder pattern).
    pub fn with_step<S: PipelineStep + 'static>(mut self, step: S) -> Self {
        self.add_step(step);
        self
    }

    /// Share cancellation with an existing handle.
    pub fn with_cancel_handle(mut self, handle: CancelHandle) -> Self {
        self.cancelled = handle.flag;
        self
    }

    /// Get a cancellation handle.
    ///
    /// Call `cancel()` on the returned handle to stop the pipeline
    /// at the next step boundary.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: Arc::clone(&self.cancelled),
        }
    }

    /// Check if pipeline has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Run the pipeline with the given context and state.
    ///
    /// Executes each step in order:
    /// 1. Check for cancellation
    /// 2. Run `validate_input`
    /// 3. Run `execute`
    /// 4. Run `validate_output` (if execute returned Success)
    ///
    /// A `Halt` outcome ends the run successfully after that step.
    pub fn run(&self, ctx: &Context, state: &mut RunState) -> PipelineResult<PipelineRunResult> {
        let mut result = PipelineRunResult::default();
        let total_steps = self.steps.len();

        for (i, step) in self.steps.iter().enumerate() {
            // Check for cancellation
            if self.is_cancelled() {
                ctx.logger.warn(&format!(
                    "Pipeline cancelled before step '{}'",
                    step.name()
                ));
                return Err(PipelineError::cancelled(&ctx.run_id));
            }

            let number = i + 1;
            let step_name = step.name();
            let label = step.description();
            ctx.logger.stage(number, label, StageStatus::Started);

            // Report progress
            let percent = ((i as f64 / total_steps as f64) * 100.0) as u32;
            ctx.report_progress(step_name, percent, &format!("Starting {}", step_name));

            match self.run_step(step.as_ref(), ctx, state) {
                Ok(StepOutcome::Success) => {
                    ctx.logger.stage(number, label, StageStatus::Completed);
                    result.steps_completed.push(step_name.to_string());
                }
                Ok(StepOutcome::Skipped(reason)) => {
                    ctx.logger.info(&format!("{} skipped: {}", step_name, reason));
                    ctx.logger.stage(number, label, StageStatus::Skipped);
                    result.steps_skipped.push(step_name.to_string());
                }
                Ok(StepOutcome::Halt(reason)) => {
                    ctx.logger.info(&format!("Stopping run: {}", reason));
                    ctx.logger.stage(number, label, StageStatus::Completed);
                    result.steps_completed.push(step_name.to_string());
                    result.halted = Some(reason.clone());
                    state.halted = Some(reason);
                    break;
                }
                Err(e) if step.is_optional() => {
                    ctx.logger.warn(&format!("{} failed, continuing: {}", step_name, e));
                    ctx.logger.stage(number, label, StageStatus::Warned);
                    state.warn(format!("{}: {}", step_name, e));
                    result.steps_warned.push(step_name.to_string());
                }
                Err(e) => {
                    ctx.logger.error(&e.to_string());
                    ctx.logger.show_tail(step_name);
                    ctx.logger.stage(number, label, StageStatus::Failed);
                    return Err(e);
                }
            }
        }

        // Final progress
        ctx.report_progress("Complete", 100, "Pipeline finished");
        if result.halted.is_none() {
            ctx.logger.success("Pipeline completed successfully");
        }

        Ok(result)
    }

    fn run_step(
        &self,
        step: &dyn PipelineStep,
        ctx: &Context,
        state: &mut RunState,
    ) -> PipelineResult<StepOutcome> {
        let step_name = step.name();
        let fail = |e| PipelineError::step_failed(&ctx.run_id, step_name, e);

        // Validate input
        ctx.logger.debug(&format!("Validating input for '{}'", step_name));
        step.validate_input(ctx).map_err(fail)?;

        // Execute
        ctx.logger.debug(&format!("Executing '{}'", step_name));
        let outcome = step.execute(ctx, state).map_err(fail)?;

        if outcome == StepOutcome::Success {
            ctx.logger
                .debug(&format!("Validating output for '{}'", step_name));
            step.validate_output(ctx, state).map_err(fail)?;
        }
        Ok(outcome)
    }

    /// Get the number of steps in the pipeline.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Get step names in order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for cancelling a running pipeline.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// A handle not yet attached to any pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the pipeline.
    ///
    /// The pipeline will stop at the next step boundary.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Result of a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineRunResult {
    /// Steps that completed successfully.
    pub steps_completed: Vec<String>,
    /// Steps that were skipped.
    pub steps_skipped: Vec<String>,
    /// Optional steps that failed and were downgraded to warnings.
    pub steps_warned: Vec<String>,
    /// Set when a step ended the run early.
    pub halted: Option<String>,
}

impl PipelineRunResult {
    /// Check if all steps completed (none skipped, warned or halted).
    pub fn all_completed(&self) -> bool {
        self.steps_skipped.is_empty() && self.steps_warned.is_empty() && self.halted.is_none()
    }

    /// Total number of steps that ran.
    pub fn total_steps(&self) -> usize {
        self.steps_completed.len() + self.steps_skipped.len() + self.steps_warned.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::errors::{StepError, StepResult};
    use crate::orchestrator::test_support::test_context;
    use std::sync::atomic::AtomicUsize;

    // Mock step for testing
    struct ScriptedStep {
        name: &'static str,
        optional: bool,
        outcome: fn() -> StepResult<StepOutcome>,
        execute_count: Arc<AtomicUsize>,
    }

    impl ScriptedStep {
        fn new(name: &'static str, outcome: fn() -> StepResult<StepOutcome>) -> Self {
            Self {
                name,
                optional: false,
                outcome,
                execute_count: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn optional(mut self) -> Self {
            self.optional = true;
            self
        }
    }

    impl PipelineStep for ScriptedStep {
        fn name(&self) -> &str {
            self.name
        }

        fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
            Ok(())
        }

        fn execute(&self, _ctx: &Context, _state: &mut RunState) -> StepResult<StepOutcome> {
            self.execute_count.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }

        fn validate_output(&self, _ctx: &Context, _state: &RunState) -> StepResult<()> {
            Ok(())
        }

        fn is_optional(&self) -> bool {
            self.optional
        }
    }

    fn success() -> StepResult<StepOutcome> {
        Ok(StepOutcome::Success)
    }

    fn failure() -> StepResult<StepOutcome> {
        Err(StepError::other("boom"))
    }

    fn halt() -> StepResult<StepOutcome> {
        Ok(StepOutcome::Halt("no incomplete work items".into()))
    }

    #[test]
    fn pipeline_builds_correctly() {
        let pipeline = Pipeline::new()
            .with_step(ScriptedStep::new("Step1", success))
            .with_step(ScriptedStep::new("Step2", success));

        assert_eq!(pipeline.step_count(), 2);
        assert_eq!(pipeline.step_names(), vec!["Step1", "Step2"]);
    }

    #[test]
    fn cancel_handle_works() {
        let pipeline = Pipeline::new();
        let handle = pipeline.cancel_handle();

        assert!(!pipeline.is_cancelled());
        assert!(!handle.is_cancelled());

        handle.cancel();

        assert!(pipeline.is_cancelled());
        assert!(handle.is_cancelled());
    }

    #[test]
    fn optional_failure_becomes_warning() {
        let (ctx, _dir) = test_context();
        let last = ScriptedStep::new("Last", success);
        let last_count = last.execute_count.clone();
        let pipeline = Pipeline::new()
            .with_step(ScriptedStep::new("Env", failure).optional())
            .with_step(last);

        let mut state = RunState::new(&ctx.run_id);
        let result = pipeline.run(&ctx, &mut state).unwrap();

        assert_eq!(result.steps_warned, vec!["Env"]);
        assert_eq!(last_count.load(Ordering::SeqCst), 1);
        assert_eq!(state.warnings.len(), 1);
    }

    #[test]
    fn required_failure_stops_run() {
        let (ctx, _dir) = test_context();
        let after = ScriptedStep::new("After", success);
        let after_count = after.execute_count.clone();
        let pipeline = Pipeline::new()
            .with_step(ScriptedStep::new("Submit", failure))
            .with_step(after);

        let err = pipeline
            .run(&ctx, &mut RunState::new(&ctx.run_id))
            .unwrap_err();
        assert!(matches!(err, PipelineError::StepFailed { ref step_name, .. } if step_name == "Submit"));
        assert_eq!(after_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn halt_ends_run_without_error() {
        let (ctx, _dir) = test_context();
        let after = ScriptedStep::new("After", success);
        let after_count = after.execute_count.clone();
        let pipeline = Pipeline::new()
            .with_step(ScriptedStep::new("Resolve", halt))
            .with_step(after);

        let mut state = RunState::new(&ctx.run_id);
        let result = pipeline.run(&ctx, &mut state).unwrap();

        assert_eq!(result.halted.as_deref(), Some("no incomplete work items"));
        assert_eq!(state.halted.as_deref(), Some("no incomplete work items"));
        assert_eq!(after_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancelled_pipeline_does_not_start_steps() {
        let (ctx, _dir) = test_context();
        let step = ScriptedStep::new("First", success);
        let count = step.execute_count.clone();
        let pipeline = Pipeline::new()
            .with_step(step)
            .with_cancel_handle(ctx.cancel_handle());
        ctx.cancel_handle().cancel();

        let err = pipeline
            .run(&ctx, &mut RunState::new(&ctx.run_id))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { .. }));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
