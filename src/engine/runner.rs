// src/engine/runner.rs

use std::fmt;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::SchedulerSection;
use crate::errors::Result;
use crate::jobs::{JobScheduler, RunReport};
use crate::types::JobOutcome;

use super::{JobContext, JobEvent, RunEvent};

const EVENT_CAPACITY: usize = 256;
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Drives a [`JobScheduler`] once per tick on the tokio runtime.
///
/// This is a thin IO shell: all ordering and state semantics live in the
/// scheduler. The runner only moves futures onto tasks and events back into
/// the scheduler.
pub struct JobRunner {
    scheduler: JobScheduler,
    tick_interval: Duration,
    events: broadcast::Sender<RunEvent>,
}

impl fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRunner")
            .field("scheduler", &self.scheduler)
            .field("tick_interval", &self.tick_interval)
            .finish_non_exhaustive()
    }
}

impl JobRunner {
    /// A zero `tick_interval` is raised to [`MIN_TICK_INTERVAL`].
    pub fn new(scheduler: JobScheduler, tick_interval: Duration) -> Self {
        if tick_interval < MIN_TICK_INTERVAL {
            warn!(?tick_interval, "tick interval too small; using 1ms");
        }
        let tick_interval = tick_interval.max(MIN_TICK_INTERVAL);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            scheduler,
            tick_interval,
            events,
        }
    }

    pub fn from_config(scheduler: JobScheduler, cfg: &SchedulerSection) -> Self {
        Self::new(scheduler, Duration::from_millis(cfg.tick_interval_ms))
    }

    /// Subscribe to progress and completion notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.events.subscribe()
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut JobScheduler {
        &mut self.scheduler
    }

    pub fn into_scheduler(self) -> JobScheduler {
        self.scheduler
    }

    /// Run every registered job to a terminal state.
    ///
    /// Per tick:
    /// - drain progress/completion events reported since the last tick
    /// - tick the scheduler
    /// - spawn the processes of newly dispatched jobs
    /// - publish aggregate progress
    ///
    /// Returns the report of the finished run. If a run is already active
    /// the current report is returned without ticking.
    pub async fn run(&mut self) -> Result<RunReport> {
        if !self.scheduler.begin_run()? {
            return Ok(self.scheduler.report());
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<JobEvent>();
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            while let Ok(event) = rx.try_recv() {
                self.handle_event(event);
            }

            let step = self.scheduler.tick();
            for job in &step.dispatched {
                self.spawn_job(job, &tx);
            }

            let _ = self.events.send(RunEvent::Progress(step.progress));

            if step.run_just_finished {
                let report = self.scheduler.report();
                info!(
                    run_id = report.run_id,
                    ticks = report.ticks,
                    succeeded = report.succeeded.len(),
                    failed = report.failed.len(),
                    "job run finished"
                );
                let _ = self.events.send(RunEvent::Finished(report.clone()));
                return Ok(report);
            }
        }
    }

    fn handle_event(&mut self, event: JobEvent) {
        debug!(?event, "runner received job event");
        match event {
            JobEvent::Progress { job, value } => {
                if let Err(err) = self.scheduler.report_progress(&job, value) {
                    warn!(job = %job, error = %err, "dropping progress report");
                }
            }
            JobEvent::Finished { job, outcome } => {
                self.scheduler.complete(&job, outcome);
            }
        }
    }

    fn spawn_job(&mut self, job: &str, tx: &mpsc::UnboundedSender<JobEvent>) {
        let ctx = JobContext::new(job.to_string(), tx.clone());
        let Some(process) = self.scheduler.start_process(job, ctx) else {
            self.scheduler.complete(
                job,
                JobOutcome::Failed("process could not be started".to_string()),
            );
            return;
        };

        debug!(job = %job, "spawning job process");
        let handle = tokio::spawn(process);

        let tx = tx.clone();
        let job = job.to_string();
        tokio::spawn(async move {
            let outcome = match handle.await {
                Ok(Ok(())) => JobOutcome::Success,
                Ok(Err(err)) => JobOutcome::Failed(format!("{err:#}")),
                Err(join_err) => JobOutcome::Failed(format!("job process panicked: {join_err}")),
            };
            let _ = tx.send(JobEvent::Finished { job, outcome });
        });
    }
}
