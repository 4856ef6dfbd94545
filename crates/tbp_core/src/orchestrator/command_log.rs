//! Runner wrapper that records captured command output in the run log.

use std::io;
use std::process::Output;
use std::sync::Arc;

use crate::logging::RunLogger;
use crate::process::{CommandRunner, CommandSpec};

/// Forwards to `inner` and feeds every captured line into the logger's tail,
/// so a failing step can show what the tool printed.
pub struct LoggedRunner {
    inner: Arc<dyn CommandRunner>,
    logger: Arc<RunLogger>,
}

impl LoggedRunner {
    pub fn new(inner: Arc<dyn CommandRunner>, logger: Arc<RunLogger>) -> Self {
        Self { inner, logger }
    }
}

impl CommandRunner for LoggedRunner {
    fn run(&self, spec: &CommandSpec) -> io::Result<Output> {
        let output = self.inner.run(spec)?;
        let stdout = spec.mask_secrets(&String::from_utf8_lossy(&output.stdout));
        let stderr = spec.mask_secrets(&String::from_utf8_lossy(&output.stderr));
        self.logger.output_text(&stdout, &stderr);
        Ok(output)
    }
}
