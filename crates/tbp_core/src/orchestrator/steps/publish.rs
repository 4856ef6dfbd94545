//! Publish step - pushes the output directory to a fresh branch.
//!
//! Gated on the job's terminal status unless `scheduler.publish_gate` is
//! `always`.

use crate::config::PublishGate;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, RunState, StepOutcome};
use crate::publish::{AuthenticatedRemote, GitCli, PublishOutcome, PublishRequest, RepositoryPublisher};
use crate::scheduler::JobStatus;

pub struct PublishStep;

impl PublishStep {
    pub fn new() -> Self {
        Self
    }

    fn check_gate(gate: PublishGate, status: Option<JobStatus>) -> StepResult<()> {
        match (gate, status) {
            (PublishGate::Always, _) => Ok(()),
            (PublishGate::CompletedOnly, Some(JobStatus::Completed)) => Ok(()),
            (PublishGate::CompletedOnly, Some(other)) => Err(StepError::precondition_failed(
                format!("job ended as {}; refusing to publish its output", other),
            )),
            (PublishGate::CompletedOnly, None) => Err(StepError::precondition_failed(
                "no terminal job status; refusing to publish",
            )),
        }
    }
}

impl Default for PublishStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for PublishStep {
    fn name(&self) -> &str {
        "Publish"
    }

    fn description(&self) -> &str {
        "Publish outputs to repository"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        if !ctx.settings.output_dir().is_dir() {
            return Err(StepError::file_not_found(
                ctx.settings.output_dir().display().to_string(),
            ));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<StepOutcome> {
        let settings = &ctx.settings;
        Self::check_gate(settings.scheduler.publish_gate, state.terminal_status)?;

        let remote = AuthenticatedRemote::from_settings(&settings.git, ctx.services.git_token.clone());
        let git = GitCli::new(&settings.git.binary, ctx.command_runner());
        let publisher = RepositoryPublisher::new(git, remote);

        let request = PublishRequest {
            source_dir: settings.output_dir(),
            repo_path: settings.git_repo_path(),
            branch_prefix: settings.git.branch_prefix.clone(),
            default_branch: settings.git.default_branch.clone(),
            started_at: ctx.started_at,
        };
        ctx.logger.info(&format!(
            "Publishing {} to {} via {}",
            request.source_dir.display(),
            publisher.remote(),
            request.repo_path.display()
        ));

        let outcome = publisher.publish(&request)?;
        match &outcome {
            PublishOutcome::Pushed {
                branch,
                files,
                pull_request_url,
            } => {
                ctx.logger
                    .success(&format!("Pushed {} file(s) to {}", files.len(), branch));
                ctx.logger
                    .info(&format!("Open a pull request: {}", pull_request_url));
            }
            PublishOutcome::NoChanges { branch } => {
                ctx.logger
                    .info(&format!("No new changes after sync; nothing pushed ({})", branch));
            }
        }

        state.publish = Some(outcome);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &RunState) -> StepResult<()> {
        if state.publish.is_none() {
            return Err(StepError::invalid_output("publish outcome not recorded"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_only_gate_blocks_failed_jobs() {
        assert!(PublishStep::check_gate(PublishGate::CompletedOnly, Some(JobStatus::Completed)).is_ok());

        let err = PublishStep::check_gate(PublishGate::CompletedOnly, Some(JobStatus::Failed))
            .unwrap_err();
        assert!(err.to_string().contains("FAILED"));
        assert!(PublishStep::check_gate(PublishGate::CompletedOnly, None).is_err());
    }

    #[test]
    fn always_gate_publishes_any_status() {
        assert!(PublishStep::check_gate(PublishGate::Always, Some(JobStatus::TimedOut)).is_ok());
        assert!(PublishStep::check_gate(PublishGate::Always, None).is_ok());
    }
}
