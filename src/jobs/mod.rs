// src/jobs/mod.rs

//! Job registry and dependency scheduling.
//!
//! - [`job`] defines the [`Job`] contract and [`JobKind`] capability ids.
//! - [`slot`] holds a registered job plus its per-run state.
//! - [`graph`] snapshots resolved dependencies and checks for cycles.
//! - [`state_manager`] implements readiness, failure propagation and
//!   progress aggregation.
//! - [`scheduler`] is the tick-driven state machine tying these together.
//! - [`scheduler_step`] defines the tick and report result types.

pub mod graph;
pub mod job;
pub mod scheduler;
pub mod scheduler_step;
pub mod slot;
pub mod state_manager;

pub use graph::DependencyGraph;
pub use job::{AsAny, Job, JobFuture, JobId, JobKind};
pub use scheduler::JobScheduler;
pub use scheduler_step::{RunReport, SchedulerTick};
pub use slot::JobRunState;
