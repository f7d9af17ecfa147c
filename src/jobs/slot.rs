// src/jobs/slot.rs

//! Registered job plus its per-run state.

use std::fmt;

use crate::errors::{Result, StagehandError};
use crate::jobs::job::{Job, JobId, JobKind};

/// Per-run state of a job (internal).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    /// Not started; waiting on dependencies or on the next tick.
    Waiting,
    /// Process dispatched and not yet finished.
    Running,
    Completed,
    /// Process failed, or a dependency failed before this job started.
    Failed(String),
}

/// Public, read-only view of a job's per-run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRunState {
    Waiting,
    Running,
    Completed,
    Failed,
}

impl From<&RunState> for JobRunState {
    fn from(state: &RunState) -> Self {
        match state {
            RunState::Waiting => JobRunState::Waiting,
            RunState::Running => JobRunState::Running,
            RunState::Completed => JobRunState::Completed,
            RunState::Failed(_) => JobRunState::Failed,
        }
    }
}

/// A registered job: static declarations captured at registration, the
/// resolved dependency list, and per-run state.
pub struct JobSlot {
    pub id: JobId,
    pub kinds: Vec<JobKind>,
    pub dependency_kinds: Vec<JobKind>,
    pub weight: f32,
    /// Direct dependencies, by id. Resolved from `dependency_kinds` plus any
    /// hand-added ones.
    pub deps: Vec<JobId>,
    pub state: RunState,
    /// Normalised progress in `0..=1`.
    pub progress: f32,
    pub job: Box<dyn Job>,
}

impl JobSlot {
    pub fn new(job: Box<dyn Job>) -> Result<Self> {
        let id = job.id().to_string();
        let weight = job.progress_weight();
        if !weight.is_finite() || weight <= 0.0 {
            return Err(StagehandError::InvalidWeight { job: id, weight });
        }

        Ok(Self {
            kinds: job.kinds(),
            dependency_kinds: job.dependency_kinds(),
            id,
            weight,
            deps: Vec::new(),
            state: RunState::Waiting,
            progress: 0.0,
            job,
        })
    }

    pub fn reset(&mut self) {
        self.state = RunState::Waiting;
        self.progress = 0.0;
    }

    pub fn provides(&self, kind: &JobKind) -> bool {
        self.kinds.contains(kind)
    }

    pub fn is_completed(&self) -> bool {
        self.state == RunState::Completed
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, RunState::Completed | RunState::Failed(_))
    }
}

impl fmt::Debug for JobSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobSlot")
            .field("id", &self.id)
            .field("kinds", &self.kinds)
            .field("dependency_kinds", &self.dependency_kinds)
            .field("weight", &self.weight)
            .field("deps", &self.deps)
            .field("state", &self.state)
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}

/// Reject progress values outside `0..=1` (including NaN).
pub fn validate_progress(job: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(StagehandError::InvalidProgress {
            job: job.to_string(),
            value,
        })
    }
}
