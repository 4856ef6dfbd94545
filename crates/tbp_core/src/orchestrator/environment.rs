//! Best-effort environment preparation (HPC `module load`).

use std::sync::Arc;

use crate::config::EnvironmentSettings;
use crate::process::{run_checked, CommandError, CommandRunner, CommandSpec};

/// Prepares the process environment before the run.
///
/// Platform specific and best-effort: the orchestrator only warns when it
/// fails.
pub trait EnvironmentLoader: Send + Sync {
    /// Load `modules`. Called only when at least one module is configured.
    fn load(&self, modules: &[String]) -> Result<(), CommandError>;

    fn describe(&self) -> String;
}

/// Runs the configured loader command with the modules appended, e.g.
/// `module load cuda/12.1 ffmpeg`.
pub struct ModuleLoader {
    command: Vec<String>,
    runner: Arc<dyn CommandRunner>,
}

impl ModuleLoader {
    pub fn new(command: Vec<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self { command, runner }
    }

    pub fn from_settings(settings: &EnvironmentSettings, runner: Arc<dyn CommandRunner>) -> Self {
        Self::new(settings.module_command.clone(), runner)
    }
}

impl EnvironmentLoader for ModuleLoader {
    fn load(&self, modules: &[String]) -> Result<(), CommandError> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(CommandError::NotInstalled {
                program: String::new(),
                command: "(empty module command)".to_string(),
            });
        };
        let spec = CommandSpec::new(program)
            .args(args.iter().map(String::as_str))
            .args(modules.iter().map(String::as_str));
        run_checked(self.runner.as_ref(), &spec)?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.command.join(" ")
    }
}

/// Loads nothing. For machines without environment modules.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLoader;

impl EnvironmentLoader for NoopLoader {
    fn load(&self, _modules: &[String]) -> Result<(), CommandError> {
        Ok(())
    }

    fn describe(&self) -> String {
        "none".to_string()
    }
}
