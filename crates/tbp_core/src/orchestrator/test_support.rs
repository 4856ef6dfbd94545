//! Fixtures for orchestrator tests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tempfile::TempDir;

use super::environment::NoopLoader;
use super::types::{Context, Services};
use crate::config::{Secret, Settings, ShareBackend};
use crate::fetch::MountedShare;
use crate::logging::{LogConfig, RunLogger};
use crate::process::test_support::StubRunner;
use crate::scheduler::Sleeper;
use crate::work_items::{SheetSource, WorkItemResult};

/// Sheet returning fixed CSV text.
pub(crate) struct StaticSheet(pub(crate) String);

impl SheetSource for StaticSheet {
    fn fetch_csv(&self) -> WorkItemResult<String> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        "static sheet".to_string()
    }
}

/// Returns immediately.
pub(crate) struct NoSleep;

impl Sleeper for NoSleep {
    fn sleep(&self, _duration: Duration) {}
}

/// Valid settings rooted in `dir`: working tree at `dir/work`, mounted
/// share at `dir/share`.
pub(crate) fn test_settings(dir: &Path) -> Settings {
    let working_dir = dir.join("work");
    std::fs::create_dir_all(&working_dir).expect("working dir");

    let mut settings = Settings::default();
    settings.paths.working_dir = working_dir.display().to_string();
    settings.share.backend = ShareBackend::Mounted;
    settings.share.mount_root = dir.join("share").display().to_string();
    settings.share.base_path = "Audio".to_string();
    settings.sheet.url = "https://sheets.example.com/export.csv".to_string();
    settings.git.owner = "lab".to_string();
    settings.git.repo = "transcripts".to_string();
    settings.git.username = "bot".to_string();
    settings.scheduler.descriptor_template = "job.slurm.template".to_string();
    settings
}

/// Inert collaborators: an empty sheet, the mounted share under `dir`, and
/// a runner with nothing scripted.
pub(crate) fn test_services(dir: &Path) -> Services {
    Services {
        runner: Arc::new(StubRunner::with_results(Vec::new())),
        sheet: Box::new(StaticSheet("as,Done\n".to_string())),
        share: Box::new(MountedShare::new(dir.join("share"))),
        environment: Box::new(NoopLoader),
        sleeper: Box::new(NoSleep),
        git_token: Secret::new("token"),
    }
}

pub(crate) fn context_with(settings: Settings, services: Services) -> Context {
    let logger = Arc::new(RunLogger::detached("test-run", LogConfig::default(), None));
    Context::new(settings, "test-run", Local::now(), logger, services)
}

/// Context over a temporary directory with inert collaborators.
pub(crate) fn test_context() -> (Context, TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    let ctx = context_with(test_settings(dir.path()), test_services(dir.path()));
    (ctx, dir)
}
