//! Scripted command runner shared by unit tests.

use std::collections::VecDeque;
use std::io;
use std::process::Output;

use parking_lot::Mutex;

use super::{CommandRunner, CommandSpec};

type Handler = Box<dyn Fn(&CommandSpec) -> io::Result<Output> + Send + Sync>;

/// Records every command and answers from a queue or a handler closure.
pub(crate) struct StubRunner {
    calls: Mutex<Vec<CommandSpec>>,
    results: Mutex<VecDeque<io::Result<Output>>>,
    handler: Option<Handler>,
}

impl StubRunner {
    pub(crate) fn with_results(results: Vec<io::Result<Output>>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            results: Mutex::new(VecDeque::from(results)),
            handler: None,
        }
    }

    pub(crate) fn with_handler(
        handler: impl Fn(&CommandSpec) -> io::Result<Output> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            results: Mutex::new(VecDeque::new()),
            handler: Some(Box::new(handler)),
        }
    }

    /// Rendered (redacted) command lines in call order.
    pub(crate) fn rendered_calls(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.display()).collect()
    }

    pub(crate) fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().clone()
    }
}

impl CommandRunner for StubRunner {
    fn run(&self, spec: &CommandSpec) -> io::Result<Output> {
        self.calls.lock().push(spec.clone());

        if let Some(handler) = &self.handler {
            return handler(spec);
        }

        self.results.lock().pop_front().unwrap_or_else(|| {
            Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "missing stubbed command output",
            ))
        })
    }
}

pub(crate) fn output(code: i32, stdout: &str, stderr: &str) -> Output {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        Output {
            status: std::process::ExitStatus::from_raw(code << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }
    #[cfg(windows)]
    {
        use std::os::windows::process::ExitStatusExt;
        Output {
            status: std::process::ExitStatus::from_raw(code as u32),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }
}

pub(crate) fn ok(stdout: &str) -> io::Result<Output> {
    Ok(output(0, stdout, ""))
}
