// src/jobs/scheduler_step.rs

//! Result types for scheduler ticks and finished runs.

use crate::jobs::job::JobId;

/// Structured result of a single scheduler tick.
///
/// Tests step the scheduler manually and assert on these.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerTick {
    /// 1-based tick number within the current run.
    pub tick: u64,
    /// Jobs that became ready and were marked running on this tick, in
    /// registration order. The caller must start their processes.
    pub dispatched: Vec<JobId>,
    /// Aggregate progress after this tick's dispatch.
    pub progress: f32,
    /// Whether every job reached a terminal state on this tick.
    pub run_just_finished: bool,
}

impl SchedulerTick {
    pub(crate) fn idle(progress: f32) -> Self {
        Self {
            tick: 0,
            dispatched: Vec::new(),
            progress,
            run_just_finished: false,
        }
    }
}

/// Summary of a finished (or inspected) run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub run_id: u64,
    pub ticks: u64,
    /// Completed jobs in registration order.
    pub succeeded: Vec<JobId>,
    /// Failed jobs with the reason, in registration order.
    pub failed: Vec<(JobId, String)>,
    pub progress: f32,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}
