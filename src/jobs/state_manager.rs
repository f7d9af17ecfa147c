// src/jobs/state_manager.rs

//! Per-run state transitions for jobs in the scheduler.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::jobs::graph::DependencyGraph;
use crate::jobs::job::JobId;
use crate::jobs::slot::{JobSlot, RunState};

/// Manages per-run state transitions for jobs.
pub struct StateManager<'a> {
    slots: &'a mut [JobSlot],
    current_run_id: Option<u64>,
}

impl<'a> StateManager<'a> {
    pub fn new(slots: &'a mut [JobSlot], current_run_id: Option<u64>) -> Self {
        Self {
            slots,
            current_run_id,
        }
    }

    /// Collect waiting jobs whose dependencies are all completed, mark them
    /// `Running`, and return their ids in registration order.
    pub fn collect_ready_jobs(&mut self) -> Vec<JobId> {
        // Decide first, then mutate to avoid borrowing issues.
        let candidates: Vec<usize> = {
            let ro = ReadOnlyStateManager::new(self.slots);
            self.slots
                .iter()
                .enumerate()
                .filter(|(_, slot)| {
                    slot.state == RunState::Waiting && ro.deps_satisfied_for_slot(slot)
                })
                .map(|(idx, _)| idx)
                .collect()
        };

        let mut ready = Vec::with_capacity(candidates.len());
        for idx in candidates {
            let slot = &mut self.slots[idx];
            info!(
                job = %slot.id,
                run_id = self.current_run_id,
                "dependencies completed; dispatching job"
            );
            slot.state = RunState::Running;
            ready.push(slot.id.clone());
        }

        ready
    }

    /// Mark every not-yet-started job that (transitively) depends on
    /// `failed_job` as failed.
    ///
    /// Returns the newly failed jobs, excluding `failed_job` itself.
    pub fn mark_dependents_failed(
        &mut self,
        graph: &DependencyGraph,
        failed_job: &str,
    ) -> Vec<JobId> {
        let mut stack: Vec<JobId> = vec![failed_job.to_string()];
        let mut visited: HashSet<JobId> = HashSet::new();
        let mut newly_failed = Vec::new();

        while let Some(upstream) = stack.pop() {
            if !visited.insert(upstream.clone()) {
                continue;
            }

            for dependent in graph.dependents_of(&upstream) {
                let Some(slot) = self.slots.iter_mut().find(|s| &s.id == dependent) else {
                    continue;
                };
                match slot.state {
                    RunState::Waiting => {
                        debug!(
                            job = %slot.id,
                            upstream = %upstream,
                            "marking dependent as failed due to upstream failure"
                        );
                        slot.state =
                            RunState::Failed(format!("dependency '{}' failed", upstream));
                        newly_failed.push(slot.id.clone());
                        stack.push(slot.id.clone());
                    }
                    RunState::Running => {
                        // Only reachable if deps were edited mid-run.
                        warn!(
                            job = %slot.id,
                            upstream = %upstream,
                            "dependent already running when upstream failed; leaving it be"
                        );
                    }
                    RunState::Completed | RunState::Failed(_) => {}
                }
            }
        }

        newly_failed
    }

    pub fn all_jobs_terminal(&self) -> bool {
        self.slots.iter().all(JobSlot::is_terminal)
    }
}

/// A read-only view used where only shared access to the slots is available.
pub struct ReadOnlyStateManager<'a> {
    slots: &'a [JobSlot],
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(slots: &'a [JobSlot]) -> Self {
        Self { slots }
    }

    /// Whether every dependency of `slot` has completed in this run.
    pub fn deps_satisfied_for_slot(&self, slot: &JobSlot) -> bool {
        slot.deps.iter().all(|dep_id| {
            match self.slots.iter().find(|s| &s.id == dep_id) {
                Some(dep) => dep.is_completed(),
                None => {
                    warn!(
                        job = %slot.id,
                        dep = %dep_id,
                        "dependency missing from scheduler"
                    );
                    false
                }
            }
        })
    }

    /// Weighted mean of per-job progress: `Σ(p·w) / Σ(w)`.
    ///
    /// An empty job set counts as fully progressed.
    pub fn aggregate_progress(&self) -> f32 {
        let total_weight: f32 = self.slots.iter().map(|s| s.weight).sum();
        if total_weight <= 0.0 {
            return 1.0;
        }

        let weighted: f32 = self.slots.iter().map(|s| s.progress * s.weight).sum();
        (weighted / total_weight).clamp(0.0, 1.0)
    }
}
