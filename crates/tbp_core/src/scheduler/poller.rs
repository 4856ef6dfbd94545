//! Fixed-interval status polling.

use std::time::Duration;

use super::slurm::{SchedulerJob, SlurmScheduler, StatusProbe, StatusSource};
use super::status::JobStatus;
use super::{SchedulerError, SchedulerResult};
use crate::orchestrator::CancelHandle;

/// Blocks between polls.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Polls a job until it reaches a terminal status.
///
/// There is no timeout ceiling; the scheduler's own wall-clock limit on the
/// job bounds the wait.
pub struct JobPoller<'a> {
    scheduler: &'a SlurmScheduler,
    sleeper: &'a dyn Sleeper,
    interval: Duration,
    cancel: Option<CancelHandle>,
}

impl<'a> JobPoller<'a> {
    pub fn new(scheduler: &'a SlurmScheduler, sleeper: &'a dyn Sleeper, interval: Duration) -> Self {
        Self {
            scheduler,
            sleeper,
            interval,
            cancel: None,
        }
    }

    /// Stop polling when `handle` is cancelled (checked between ticks).
    pub fn with_cancel(mut self, handle: CancelHandle) -> Self {
        self.cancel = Some(handle);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }

    /// Poll until terminal, updating `job.status` and reporting every
    /// observation to `on_status`.
    pub fn wait(
        &self,
        job: &mut SchedulerJob,
        mut on_status: impl FnMut(&StatusProbe),
    ) -> SchedulerResult<JobStatus> {
        loop {
            if self.is_cancelled() {
                return Err(SchedulerError::Interrupted {
                    job_id: job.job_id.clone(),
                });
            }

            let probe = self.scheduler.query_status(&job.job_id);
            job.status = probe.status;

            if let StatusSource::Assumed { queries_failed } = probe.source {
                if queries_failed {
                    tracing::warn!(
                        "Job {}: neither squeue nor sacct could be queried; treating as COMPLETED, which may hide a monitoring failure",
                        job.job_id
                    );
                } else {
                    tracing::info!(
                        "Job {} is no longer known to the scheduler; assuming completion",
                        job.job_id
                    );
                }
            }

            on_status(&probe);

            if probe.status.is_terminal() {
                return Ok(probe.status);
            }

            tracing::debug!(
                "Job {} is {}; next check in {}s",
                job.job_id,
                probe.status,
                self.interval.as_secs()
            );
            self.sleeper.sleep(self.interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerSettings;
    use crate::process::test_support::{ok, StubRunner};
    use chrono::Local;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingSleeper {
        naps: Mutex<Vec<Duration>>,
        cancel_after: Option<(usize, CancelHandle)>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            let mut naps = self.naps.lock();
            naps.push(duration);
            if let Some((n, handle)) = &self.cancel_after {
                if naps.len() >= *n {
                    handle.cancel();
                }
            }
        }
    }

    fn job() -> SchedulerJob {
        SchedulerJob {
            job_id: "4242".into(),
            submission_time: Local::now(),
            status: JobStatus::Pending,
        }
    }

    #[test]
    fn polls_until_terminal() {
        let runner = Arc::new(StubRunner::with_results(vec![
            ok("JOBID ST\n4242 PD\n"),
            ok("JOBID ST\n4242 R\n"),
            ok("JOBID ST\n"),
            ok("COMPLETED\n"),
        ]));
        let scheduler = SlurmScheduler::new(&SchedulerSettings::default(), runner);
        let sleeper = RecordingSleeper::default();
        let poller = JobPoller::new(&scheduler, &sleeper, Duration::from_secs(300));

        let mut job = job();
        let mut seen = Vec::new();
        let status = poller.wait(&mut job, |p| seen.push(p.status)).unwrap();

        assert_eq!(status, JobStatus::Completed);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(
            seen,
            vec![JobStatus::Pending, JobStatus::Running, JobStatus::Completed]
        );
        assert_eq!(sleeper.naps.lock().as_slice(), &[Duration::from_secs(300); 2]);
    }

    #[test]
    fn out_of_memory_job_stops_polling() {
        let runner = Arc::new(StubRunner::with_handler(|spec| match spec.program() {
            "squeue" => ok("JOBID ST\n"),
            _ => ok("OUT_OF_ME+\nOUT_OF_ME+\n"),
        }));
        let scheduler = SlurmScheduler::new(&SchedulerSettings::default(), runner.clone());
        let handle = CancelHandle::new();
        let sleeper = RecordingSleeper {
            naps: Mutex::new(Vec::new()),
            cancel_after: Some((5, handle.clone())),
        };
        let poller = JobPoller::new(&scheduler, &sleeper, Duration::from_secs(1))
            .with_cancel(handle);

        let mut job = job();
        let status = poller.wait(&mut job, |_| {}).unwrap();

        assert_eq!(status, JobStatus::Failed);
        assert_eq!(job.status, JobStatus::Failed);
        assert!(sleeper.naps.lock().is_empty());
        assert_eq!(runner.calls().len(), 2);
    }

    #[test]
    fn cancel_interrupts_between_ticks() {
        let runner = Arc::new(StubRunner::with_handler(|_| ok("JOBID ST\n4242 R\n")));
        let scheduler = SlurmScheduler::new(&SchedulerSettings::default(), runner);
        let handle = CancelHandle::new();
        let sleeper = RecordingSleeper {
            naps: Mutex::new(Vec::new()),
            cancel_after: Some((3, handle.clone())),
        };
        let poller = JobPoller::new(&scheduler, &sleeper, Duration::from_secs(1))
            .with_cancel(handle);

        let err = poller.wait(&mut job(), |_| {}).unwrap_err();
        assert!(matches!(err, SchedulerError::Interrupted { ref job_id } if job_id == "4242"));
        assert_eq!(sleeper.naps.lock().len(), 3);
    }
}
