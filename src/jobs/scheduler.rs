use tracing::{debug, error, info, warn};

use crate::engine::JobContext;
use crate::errors::{Result, StagehandError};
use crate::jobs::graph::DependencyGraph;
use crate::jobs::job::{Job, JobFuture, JobId, JobKind};
use crate::jobs::scheduler_step::{RunReport, SchedulerTick};
use crate::jobs::slot::{validate_progress, JobRunState, JobSlot, RunState};
use crate::jobs::state_manager::{ReadOnlyStateManager, StateManager};
use crate::types::JobOutcome;

/// JobScheduler owns the registered jobs plus mutable per-run state.
///
/// It is responsible for:
/// - keeping jobs in registration order
/// - resolving declared dependency kinds into concrete dependencies
/// - deciding, once per tick, which jobs are ready to start
/// - recording progress and outcomes reported by running jobs
/// - failing dependents when a job fails
/// - aggregating weighted progress
///
/// It performs no IO and never polls futures; [`JobRunner`](crate::engine::JobRunner)
/// drives it.
#[derive(Debug, Default)]
pub struct JobScheduler {
    slots: Vec<JobSlot>,
    /// Monotonically increasing run ID.
    run_counter: u64,
    /// Currently active run ID, or `None` if there is no active run.
    current_run_id: Option<u64>,
    /// Ticks elapsed in the current (or last) run.
    tick_count: u64,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job. Ids must be unique within the scheduler.
    pub fn register(&mut self, job: impl Job) -> Result<()> {
        self.register_boxed(Box::new(job))
    }

    pub fn register_boxed(&mut self, job: Box<dyn Job>) -> Result<()> {
        if self.slot(job.id()).is_some() {
            return Err(StagehandError::DuplicateJob(job.id().to_string()));
        }

        let mut slot = JobSlot::new(job)?;
        if self.current_run_id.is_some() {
            debug!(job = %slot.id, "job registered mid-run; running setup now");
            slot.job.setup();
        }

        debug!(job = %slot.id, weight = slot.weight, "registered job");
        self.slots.push(slot);
        Ok(())
    }

    /// Remove a job and every reference other jobs hold to it.
    pub fn unregister(&mut self, id: &str) -> Option<Box<dyn Job>> {
        let idx = self.slots.iter().position(|s| s.id == id)?;
        let slot = self.slots.remove(idx);

        for other in self.slots.iter_mut() {
            other.deps.retain(|dep| dep != id);
        }

        debug!(job = %id, "unregistered job");
        Some(slot.job)
    }

    /// Add a hand-declared dependency: `id` waits for `dep`.
    ///
    /// Manual dependencies survive [`update_dependencies`](Self::update_dependencies).
    pub fn add_dependency(&mut self, id: &str, dep: &str) -> Result<()> {
        if id == dep {
            return Err(StagehandError::DependencyCycle(format!(
                "job '{}' cannot depend on itself",
                id
            )));
        }
        if self.slot(dep).is_none() {
            return Err(StagehandError::JobNotFound(dep.to_string()));
        }

        let slot = self
            .slot_mut(id)
            .ok_or_else(|| StagehandError::JobNotFound(id.to_string()))?;
        if !slot.deps.iter().any(|d| d == dep) {
            slot.deps.push(dep.to_string());
        }
        Ok(())
    }

    /// Rebuild every job's dependency list from its declared kinds.
    ///
    /// For each job: the previous list is cleared, every *other* job
    /// providing one of the declared kinds is attached (registration order),
    /// then previous dependencies not matched by kind are re-appended so
    /// hand-added edges survive. Running it twice yields the same lists.
    pub fn update_dependencies(&mut self) -> Result<()> {
        let providers: Vec<(JobId, Vec<JobKind>)> = self
            .slots
            .iter()
            .map(|s| (s.id.clone(), s.kinds.clone()))
            .collect();

        for slot in self.slots.iter_mut() {
            let previous = std::mem::take(&mut slot.deps);

            for kind in &slot.dependency_kinds {
                for (other_id, other_kinds) in &providers {
                    if *other_id == slot.id || !other_kinds.contains(kind) {
                        continue;
                    }
                    if !slot.deps.contains(other_id) {
                        slot.deps.push(other_id.clone());
                    }
                }
            }

            for dep in previous {
                if !slot.deps.contains(&dep) {
                    slot.deps.push(dep);
                }
            }

            debug!(job = %slot.id, deps = ?slot.deps, "resolved dependencies");
        }

        self.graph().topological_order()?;
        Ok(())
    }

    /// Adjacency snapshot of the current dependencies.
    pub fn graph(&self) -> DependencyGraph {
        DependencyGraph::from_slots(&self.slots)
    }

    pub fn dependencies_of(&self, id: &str) -> Option<&[JobId]> {
        self.slot(id).map(|s| s.deps.as_slice())
    }

    /// Job ids in registration order.
    pub fn job_ids(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns `true` if a run is in progress.
    pub fn is_running(&self) -> bool {
        self.current_run_id.is_some()
    }

    pub fn current_run_id(&self) -> Option<u64> {
        self.current_run_id
    }

    /// Every job's per-run state back to `Waiting` with zero progress.
    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.reset();
        }
    }

    /// Start a new run: validate the graph, reset every job and call
    /// `setup()` on each in registration order.
    ///
    /// Returns `Ok(false)` without touching anything if a run is already
    /// active.
    pub fn begin_run(&mut self) -> Result<bool> {
        if let Some(run_id) = self.current_run_id {
            warn!(run_id, "begin_run called while a run is active; ignoring");
            return Ok(false);
        }

        self.graph().topological_order()?;

        self.reset();
        for slot in self.slots.iter_mut() {
            slot.job.setup();
        }

        self.run_counter += 1;
        self.current_run_id = Some(self.run_counter);
        self.tick_count = 0;

        info!(
            run_id = self.run_counter,
            jobs = self.slots.len(),
            "scheduler: starting new run"
        );
        Ok(true)
    }

    /// Advance the run by one tick.
    ///
    /// Dispatches every waiting job whose dependencies are complete, in
    /// registration order, and finishes the run once every job is terminal.
    pub fn tick(&mut self) -> SchedulerTick {
        if self.current_run_id.is_none() {
            return SchedulerTick::idle(self.aggregate_progress());
        }

        self.tick_count += 1;

        let mut manager = StateManager::new(&mut self.slots, self.current_run_id);
        let dispatched = manager.collect_ready_jobs();
        let finished = manager.all_jobs_terminal();
        let progress = self.aggregate_progress();

        if finished {
            info!(
                run_id = self.current_run_id,
                ticks = self.tick_count,
                "scheduler: all jobs terminal; run finished"
            );
            self.current_run_id = None;
        }

        SchedulerTick {
            tick: self.tick_count,
            dispatched,
            progress,
            run_just_finished: finished,
        }
    }

    /// Hand out the process future of a job that [`tick`](Self::tick) just
    /// dispatched.
    pub fn start_process(&mut self, id: &str, ctx: JobContext) -> Option<JobFuture> {
        match self.slot_mut(id) {
            Some(slot) if slot.state == RunState::Running => Some(slot.job.process(ctx)),
            Some(slot) => {
                warn!(job = %id, state = ?slot.state, "start_process on a job that is not running");
                None
            }
            None => {
                warn!(job = %id, "start_process for unknown job");
                None
            }
        }
    }

    /// Record progress reported by a running job.
    ///
    /// Out-of-range values are rejected. Values below the job's current
    /// progress are ignored so aggregate progress never goes backwards.
    pub fn report_progress(&mut self, id: &str, value: f32) -> Result<()> {
        validate_progress(id, value)?;

        let slot = self
            .slot_mut(id)
            .ok_or_else(|| StagehandError::JobNotFound(id.to_string()))?;

        if slot.state != RunState::Running {
            debug!(job = %id, state = ?slot.state, "progress from job that is not running; ignoring");
            return Ok(());
        }
        if value < slot.progress {
            debug!(job = %id, value, current = slot.progress, "ignoring progress regression");
            return Ok(());
        }

        slot.progress = value;
        Ok(())
    }

    /// Record a job's outcome.
    ///
    /// Returns the jobs newly marked failed: the job itself on failure plus
    /// every dependent that had not started.
    pub fn complete(&mut self, id: &str, outcome: JobOutcome) -> Vec<JobId> {
        let run_id = match self.current_run_id {
            Some(run_id) => run_id,
            None => {
                warn!(job = %id, "completion with no active run; ignoring");
                return Vec::new();
            }
        };

        let Some(slot) = self.slot_mut(id) else {
            warn!(job = %id, "completion for unknown job; ignoring");
            return Vec::new();
        };

        if slot.state != RunState::Running {
            warn!(job = %id, state = ?slot.state, "completion for job that is not running; ignoring");
            return Vec::new();
        }

        match outcome {
            JobOutcome::Success => {
                slot.state = RunState::Completed;
                slot.progress = 1.0;
                debug!(job = %id, run_id, "job completed");
                Vec::new()
            }
            JobOutcome::Failed(reason) => {
                error!(job = %id, run_id, reason = %reason, "job failed; failing dependents");
                slot.state = RunState::Failed(reason);
                let mut newly_failed = vec![id.to_string()];
                let graph = self.graph();
                let mut manager = StateManager::new(&mut self.slots, self.current_run_id);
                newly_failed.extend(manager.mark_dependents_failed(&graph, id));
                newly_failed
            }
        }
    }

    pub fn aggregate_progress(&self) -> f32 {
        ReadOnlyStateManager::new(&self.slots).aggregate_progress()
    }

    pub fn run_state_of(&self, id: &str) -> Option<JobRunState> {
        self.slot(id).map(|s| JobRunState::from(&s.state))
    }

    pub fn progress_of(&self, id: &str) -> Option<f32> {
        self.slot(id).map(|s| s.progress)
    }

    /// Whether the dependencies of `id` are all completed in this run.
    ///
    /// Returns `None` if the job is unknown.
    pub fn deps_satisfied(&self, id: &str) -> Option<bool> {
        let slot = self.slot(id)?;
        Some(ReadOnlyStateManager::new(&self.slots).deps_satisfied_for_slot(slot))
    }

    /// First job (registration order) providing `kind`.
    pub fn find_job(&self, kind: &JobKind) -> Option<&dyn Job> {
        self.slots
            .iter()
            .find(|s| s.provides(kind))
            .map(|s| s.job.as_ref())
    }

    /// First job whose concrete type is `T`.
    pub fn get_job<T: Job>(&self) -> Option<&T> {
        self.slots.iter().find_map(|s| {
            let job: &dyn Job = s.job.as_ref();
            job.as_any().downcast_ref::<T>()
        })
    }

    pub fn get_job_mut<T: Job>(&mut self) -> Option<&mut T> {
        self.slots.iter_mut().find_map(|s| {
            let job: &mut dyn Job = s.job.as_mut();
            job.as_any_mut().downcast_mut::<T>()
        })
    }

    /// Snapshot of the current (or last) run.
    pub fn report(&self) -> RunReport {
        let mut report = RunReport {
            run_id: self.run_counter,
            ticks: self.tick_count,
            progress: self.aggregate_progress(),
            ..RunReport::default()
        };

        for slot in &self.slots {
            match &slot.state {
                RunState::Completed => report.succeeded.push(slot.id.clone()),
                RunState::Failed(reason) => report.failed.push((slot.id.clone(), reason.clone())),
                RunState::Waiting | RunState::Running => {}
            }
        }

        report
    }

    fn slot(&self, id: &str) -> Option<&JobSlot> {
        self.slots.iter().find(|s| s.id == id)
    }

    fn slot_mut(&mut self, id: &str) -> Option<&mut JobSlot> {
        self.slots.iter_mut().find(|s| s.id == id)
    }
}
