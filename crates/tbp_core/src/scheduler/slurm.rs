//! `sbatch` / `squeue` / `sacct` invocations.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::status::JobStatus;
use super::{SchedulerError, SchedulerResult};
use crate::config::SchedulerSettings;
use crate::process::{run_captured, CommandRunner, CommandSpec};

static SUBMIT_ACK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Submitted batch job (\d+)").expect("ack pattern is valid"));

/// Extract the job id from the submission acknowledgement.
pub fn parse_job_id(output: &str) -> Option<String> {
    SUBMIT_ACK.captures(output).map(|caps| caps[1].to_string())
}

/// A submitted job and its last observed status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerJob {
    pub job_id: String,
    pub submission_time: DateTime<Local>,
    pub status: JobStatus,
}

/// Which view produced a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSource {
    /// Job listed in the live queue.
    LiveQueue,
    /// Job found in accounting history.
    Accounting,
    /// Neither view reported the job; assumed finished.
    Assumed {
        /// Both queries failed to run at all, so absence proves nothing.
        queries_failed: bool,
    },
}

/// One status observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusProbe {
    pub status: JobStatus,
    pub source: StatusSource,
}

/// What the live queue said about a job.
enum LiveView {
    Listed(JobStatus),
    Absent,
    QueryFailed,
}

/// What accounting said about a job.
enum HistoryView {
    Recorded(JobStatus),
    Empty,
    QueryFailed,
}

/// Slurm command line front end.
pub struct SlurmScheduler {
    submit_binary: String,
    queue_binary: String,
    accounting_binary: String,
    runner: Arc<dyn CommandRunner>,
}

impl SlurmScheduler {
    pub fn new(settings: &SchedulerSettings, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            submit_binary: settings.submit_binary.clone(),
            queue_binary: settings.queue_binary.clone(),
            accounting_binary: settings.accounting_binary.clone(),
            runner,
        }
    }

    /// Submit a job descriptor.
    ///
    /// Runs from the descriptor's directory. Not retried: a blind resubmit
    /// could run the job twice.
    pub fn submit(&self, descriptor: &Path) -> SchedulerResult<SchedulerJob> {
        let mut spec = CommandSpec::new(&self.submit_binary).arg(descriptor);
        if let Some(dir) = descriptor.parent().filter(|d| !d.as_os_str().is_empty()) {
            spec = spec.current_dir(dir);
        }

        let output = run_captured(self.runner.as_ref(), &spec).map_err(|e| {
            SchedulerError::Submit {
                command: e.command().to_string(),
                detail: e.to_string(),
            }
        })?;

        if !output.success() {
            return Err(SchedulerError::Submit {
                command: spec.display(),
                detail: format!("exit code {}: {}", output.exit_code, output.detail()),
            });
        }

        let job_id = parse_job_id(&output.stdout).ok_or_else(|| SchedulerError::UnrecognizedAck {
            output: output.detail(),
        })?;

        tracing::info!("Submitted job {}", job_id);
        Ok(SchedulerJob {
            job_id,
            submission_time: Local::now(),
            status: JobStatus::Pending,
        })
    }

    fn query_live(&self, job_id: &str) -> LiveView {
        let spec = CommandSpec::new(&self.queue_binary).args(["--job", job_id]);
        match run_captured(self.runner.as_ref(), &spec) {
            // squeue exits non-zero for ids it no longer knows, so the
            // listing alone decides.
            Ok(output) => match parse_live_listing(&output.stdout, job_id) {
                Some(status) => LiveView::Listed(status),
                None => LiveView::Absent,
            },
            Err(e) => {
                tracing::debug!("Live queue query failed: {}", e);
                LiveView::QueryFailed
            }
        }
    }

    fn query_history(&self, job_id: &str) -> HistoryView {
        let spec = CommandSpec::new(&self.accounting_binary)
            .args(["-j", job_id, "-n", "-P", "-o", "State"]);
        match run_captured(self.runner.as_ref(), &spec) {
            Ok(output) if output.success() => output
                .stdout
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(|state| HistoryView::Recorded(JobStatus::from_accounting_state(state)))
                .unwrap_or(HistoryView::Empty),
            Ok(output) => {
                tracing::debug!("Accounting query failed: {}", output.detail());
                HistoryView::QueryFailed
            }
            Err(e) => {
                tracing::debug!("Accounting query failed: {}", e);
                HistoryView::QueryFailed
            }
        }
    }

    /// Observe a job's status.
    ///
    /// Live queue first; if the job is not listed, the first accounting
    /// record; if neither knows it, `Completed`.
    pub fn query_status(&self, job_id: &str) -> StatusProbe {
        let live = self.query_live(job_id);
        if let LiveView::Listed(status) = live {
            return StatusProbe {
                status,
                source: StatusSource::LiveQueue,
            };
        }

        match self.query_history(job_id) {
            HistoryView::Recorded(status) => StatusProbe {
                status,
                source: StatusSource::Accounting,
            },
            history => StatusProbe {
                status: JobStatus::Completed,
                source: StatusSource::Assumed {
                    queries_failed: matches!(live, LiveView::QueryFailed)
                        && matches!(history, HistoryView::QueryFailed),
                },
            },
        }
    }
}

/// Find the job's row in `squeue` output and read its state.
///
/// Uses the `ST` column when a header names one; otherwise scans the row
/// for a known token. A listed row without a recognizable token is
/// `Running`.
fn parse_live_listing(stdout: &str, job_id: &str) -> Option<JobStatus> {
    let mut lines = stdout.lines().filter(|l| !l.trim().is_empty());
    let mut state_column = None;

    let array_prefix = format!("{}_", job_id);
    let is_job_row = |tokens: &[&str]| {
        tokens
            .first()
            .is_some_and(|t| *t == job_id || t.starts_with(&array_prefix))
    };

    let first = lines.next()?;
    let first_tokens: Vec<&str> = first.split_whitespace().collect();
    let mut rows: Vec<Vec<&str>> = Vec::new();
    if first_tokens.first() == Some(&"JOBID") {
        state_column = first_tokens
            .iter()
            .position(|t| *t == "ST" || *t == "STATE");
    } else {
        rows.push(first_tokens);
    }
    rows.extend(lines.map(|l| l.split_whitespace().collect()));

    let row = rows.into_iter().find(|tokens| is_job_row(tokens))?;

    let by_column = state_column
        .and_then(|i| row.get(i))
        .and_then(|t| JobStatus::from_live_token(t));
    let status = by_column
        .or_else(|| row.iter().skip(1).find_map(|t| JobStatus::from_live_token(t)))
        .unwrap_or(JobStatus::Running);
    Some(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::test_support::{ok, output, StubRunner};

    const HEADER: &str =
        "             JOBID PARTITION     NAME     USER ST       TIME  NODES NODELIST(REASON)\n";

    fn scheduler(runner: Arc<StubRunner>) -> SlurmScheduler {
        SlurmScheduler::new(&SchedulerSettings::default(), runner)
    }

    #[test]
    fn parses_submission_ack() {
        assert_eq!(
            parse_job_id("Submitted batch job 4242\n"),
            Some("4242".to_string())
        );
        assert_eq!(parse_job_id("sbatch: error: invalid partition"), None);
    }

    #[test]
    fn submit_returns_job() {
        let runner = Arc::new(StubRunner::with_results(vec![ok("Submitted batch job 777\n")]));
        let job = scheduler(runner.clone())
            .submit(Path::new("/srv/work/run_job.slurm"))
            .unwrap();

        assert_eq!(job.job_id, "777");
        assert_eq!(job.status, JobStatus::Pending);
        let calls = runner.calls();
        assert_eq!(calls[0].display(), "sbatch /srv/work/run_job.slurm");
        assert_eq!(calls[0].working_dir(), Some(Path::new("/srv/work")));
    }

    #[test]
    fn submit_failure_carries_stderr() {
        let runner = Arc::new(StubRunner::with_results(vec![Ok(output(
            1,
            "",
            "sbatch: error: Batch job submission failed: Invalid account",
        ))]));
        let err = scheduler(runner).submit(Path::new("job.slurm")).unwrap_err();
        assert!(matches!(err, SchedulerError::Submit { .. }));
        assert!(err.to_string().contains("Invalid account"));
    }

    #[test]
    fn submitted_job_is_recorded_in_summary_form() {
        let runner = Arc::new(StubRunner::with_results(vec![ok("Submitted batch job 777\n")]));
        let job = scheduler(runner).submit(Path::new("job.slurm")).unwrap();

        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["job_id"], "777");
        assert_eq!(value["status"], "pending");
        let stamp = value["submission_time"].as_str().unwrap();
        assert_eq!(
            chrono::DateTime::parse_from_rfc3339(stamp).unwrap(),
            job.submission_time
        );

        let back: SchedulerJob = serde_json::from_value(value).unwrap();
        assert_eq!(back.submission_time, job.submission_time);
    }

    #[test]
    fn unrecognized_ack_is_an_error() {
        let runner = Arc::new(StubRunner::with_results(vec![ok("queued, maybe\n")]));
        let err = scheduler(runner).submit(Path::new("job.slurm")).unwrap_err();
        assert!(matches!(err, SchedulerError::UnrecognizedAck { .. }));
    }

    #[test]
    fn live_row_uses_state_column() {
        let stdout = format!(
            "{}              4242       gpu  run_job    alice  R       5:01      1 node07\n",
            HEADER
        );
        assert_eq!(parse_live_listing(&stdout, "4242"), Some(JobStatus::Running));

        let pending = format!(
            "{}              4242       gpu  run_job    alice PD       0:00      1 (Priority)\n",
            HEADER
        );
        assert_eq!(parse_live_listing(&pending, "4242"), Some(JobStatus::Pending));
    }

    #[test]
    fn listed_without_token_defaults_to_running() {
        assert_eq!(
            parse_live_listing("4242 gpu run_job alice ?? 0:00\n", "4242"),
            Some(JobStatus::Running)
        );
    }

    #[test]
    fn header_only_means_absent() {
        assert_eq!(parse_live_listing(HEADER, "4242"), None);
        assert_eq!(parse_live_listing("", "4242"), None);
    }

    #[test]
    fn absent_from_queue_reads_accounting() {
        let runner = Arc::new(StubRunner::with_results(vec![
            Ok(output(1, "", "slurm_load_jobs error: Invalid job id specified")),
            ok("    FAILED \n    COMPLETED \n"),
        ]));
        let probe = scheduler(runner.clone()).query_status("4242");
        assert_eq!(probe.status, JobStatus::Failed);
        assert_eq!(probe.source, StatusSource::Accounting);
        assert_eq!(runner.rendered_calls()[1], "sacct -j 4242 -n -P -o State");
    }

    #[test]
    fn absent_from_both_views_is_completed() {
        let runner = Arc::new(StubRunner::with_results(vec![ok(HEADER), ok("")]));
        let probe = scheduler(runner).query_status("4242");
        assert_eq!(probe.status, JobStatus::Completed);
        assert_eq!(
            probe.source,
            StatusSource::Assumed {
                queries_failed: false
            }
        );
    }

    #[test]
    fn both_queries_failing_is_flagged() {
        let not_found = || {
            Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "missing",
            ))
        };
        let runner = Arc::new(StubRunner::with_results(vec![not_found(), not_found()]));
        let probe = scheduler(runner).query_status("4242");
        assert_eq!(probe.status, JobStatus::Completed);
        assert_eq!(
            probe.source,
            StatusSource::Assumed {
                queries_failed: true
            }
        );
    }
}
