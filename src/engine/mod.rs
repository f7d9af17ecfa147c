// src/engine/mod.rs

//! Async shell around the job scheduler.
//!
//! The pure state machine lives in [`crate::jobs::JobScheduler`]; this module
//! drives it on a tokio interval:
//! - spawning each dispatched job's process
//! - forwarding progress and completion back into the scheduler
//! - publishing [`RunEvent`]s to subscribers

use crate::jobs::{JobId, RunReport};
use crate::types::JobOutcome;

/// Events flowing from job processes back into the runner.
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// A running job reported progress in `0..=1`.
    Progress { job: JobId, value: f32 },
    /// A job's process resolved (or panicked).
    Finished { job: JobId, outcome: JobOutcome },
}

/// Notifications published by [`JobRunner`] to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// Aggregate progress, once per tick.
    Progress(f32),
    /// The run finished; every job is completed or failed.
    Finished(RunReport),
}

pub mod context;
pub mod runner;

pub use context::JobContext;
pub use runner::JobRunner;
