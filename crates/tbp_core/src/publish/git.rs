//! Thin git command wrapper.

use std::path::Path;
use std::sync::Arc;

use super::{PublishError, PublishResult, PublishStage};
use crate::process::{run_captured, CommandOutput, CommandRunner, CommandSpec};

/// Runs git through a [`CommandRunner`], turning failures into
/// [`PublishError::Git`] with the redacted command and captured output.
#[derive(Clone)]
pub struct GitCli {
    binary: String,
    runner: Arc<dyn CommandRunner>,
}

impl GitCli {
    pub fn new(binary: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            binary: binary.into(),
            runner,
        }
    }

    /// A git command, optionally run inside `repo`.
    ///
    /// Interactive credential prompts are disabled: a bad token must fail,
    /// not hang.
    pub fn command(&self, repo: Option<&Path>) -> CommandSpec {
        let spec = CommandSpec::new(&self.binary).env("GIT_TERMINAL_PROMPT", "0");
        match repo {
            Some(dir) => spec.current_dir(dir),
            None => spec,
        }
    }

    /// Run and require exit code 0.
    pub fn run(&self, stage: PublishStage, spec: &CommandSpec) -> PublishResult<CommandOutput> {
        self.run_allowing(stage, spec, &[])
    }

    /// Run, accepting 0 and any of `allowed` exit codes.
    pub fn run_allowing(
        &self,
        stage: PublishStage,
        spec: &CommandSpec,
        allowed: &[i32],
    ) -> PublishResult<CommandOutput> {
        let output = run_captured(self.runner.as_ref(), spec).map_err(|e| PublishError::Git {
            stage,
            command: e.command().to_string(),
            detail: e.to_string(),
        })?;

        if output.success() || allowed.contains(&output.exit_code) {
            Ok(output)
        } else {
            Err(PublishError::Git {
                stage,
                command: spec.display(),
                detail: format!("exit code {}: {}", output.exit_code, output.detail()),
            })
        }
    }
}
