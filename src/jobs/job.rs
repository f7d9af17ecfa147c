// src/jobs/job.rs

//! The [`Job`] contract implemented by bootstrap work units.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::engine::JobContext;

/// Canonical job identifier used throughout the scheduler.
pub type JobId = String;

/// Future returned by [`Job::process`].
///
/// It must be `'static`: anything the process needs from the job is cloned
/// or moved into the future when `process` is called.
pub type JobFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

/// Capability id a job can provide and other jobs can depend on.
///
/// A job may provide several kinds (e.g. `"ui"` and `"ui.dialogs"`), which
/// lets one dependency declaration match a family of jobs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobKind(String);

impl JobKind {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobKind {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upcast helper so [`JobScheduler::get_job`](crate::jobs::JobScheduler::get_job)
/// can downcast boxed jobs to their concrete type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A unit of asynchronous setup work.
pub trait Job: AsAny + Send {
    /// Unique identifier within a scheduler.
    fn id(&self) -> &str;

    /// Kinds this job provides.
    fn kinds(&self) -> Vec<JobKind> {
        Vec::new()
    }

    /// Kinds this job waits for. Resolved into concrete dependencies by
    /// [`JobScheduler::update_dependencies`](crate::jobs::JobScheduler::update_dependencies).
    fn dependency_kinds(&self) -> Vec<JobKind> {
        Vec::new()
    }

    /// Share of the aggregate progress. Must be positive and finite.
    fn progress_weight(&self) -> f32 {
        1.0
    }

    /// Called once per run, before the first tick.
    fn setup(&mut self) {}

    /// Start the job's work. Progress is reported through `ctx`; the job
    /// completes when the returned future resolves.
    fn process(&mut self, ctx: JobContext) -> JobFuture;
}
