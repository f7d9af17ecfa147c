// tests/scheduler_properties.rs

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use stagehand::jobs::{JobRunState, JobScheduler};
use stagehand::types::JobOutcome;
use stagehand_test_utils::fake_jobs::{JobLog, ScriptedJob};

// Acyclic by construction: job N may only need jobs 0..N-1.
#[derive(Debug, Clone)]
struct DagSpec {
    deps: Vec<Vec<usize>>,
    weights: Vec<f32>,
}

fn dag_strategy(max_jobs: usize) -> impl Strategy<Value = DagSpec> {
    (1..=max_jobs).prop_flat_map(|num_jobs| {
        (
            proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..num_jobs), num_jobs),
            proptest::collection::vec(0.1f32..10.0, num_jobs),
        )
            .prop_map(|(raw_deps, weights)| {
                let deps = raw_deps
                    .into_iter()
                    .enumerate()
                    .map(|(i, candidates)| {
                        if i == 0 {
                            return Vec::new();
                        }
                        let unique: HashSet<usize> = candidates.into_iter().map(|d| d % i).collect();
                        let mut deps: Vec<usize> = unique.into_iter().collect();
                        deps.sort();
                        deps
                    })
                    .collect();
                DagSpec { deps, weights }
            })
    })
}

fn job_name(i: usize) -> String {
    format!("job_{i}")
}

fn build(spec: &DagSpec) -> JobScheduler {
    let log = JobLog::default();
    let mut scheduler = JobScheduler::new();
    for (i, deps) in spec.deps.iter().enumerate() {
        let mut job = ScriptedJob::new(&job_name(i), &log).weight(spec.weights[i]);
        for dep in deps {
            job = job.needs(&job_name(*dep));
        }
        scheduler.register(job).unwrap();
    }
    scheduler.update_dependencies().unwrap();
    scheduler
}

proptest! {
    #[test]
    fn acyclic_graphs_complete_with_dependencies_respected(
        spec in dag_strategy(12),
        // Per tick, how many of the running jobs to complete (from the front).
        completions in proptest::collection::vec(0..4usize, 1..64),
    ) {
        let mut scheduler = build(&spec);
        prop_assert!(scheduler.begin_run().unwrap());

        let deps: HashMap<String, Vec<String>> = spec
            .deps
            .iter()
            .enumerate()
            .map(|(i, d)| (job_name(i), d.iter().map(|x| job_name(*x)).collect()))
            .collect();

        let mut completed: HashSet<String> = HashSet::new();
        let mut running: Vec<String> = Vec::new();
        let mut last_progress = 0.0f32;
        let mut finished = false;

        for tick in 0..1000usize {
            let step = scheduler.tick();

            for job in &step.dispatched {
                for dep in &deps[job] {
                    prop_assert!(completed.contains(dep), "{job} dispatched before {dep}");
                }
                running.push(job.clone());
            }

            prop_assert!((0.0..=1.0).contains(&step.progress));
            prop_assert!(step.progress >= last_progress);
            last_progress = step.progress;

            if step.run_just_finished {
                finished = true;
                break;
            }

            // Always make progress eventually so the loop terminates.
            let n = completions[tick % completions.len()].max(usize::from(tick % 4 == 3));
            for job in running.drain(..n.min(running.len())).collect::<Vec<_>>() {
                scheduler.report_progress(&job, 0.5).unwrap();
                scheduler.complete(&job, JobOutcome::Success);
                completed.insert(job);
            }
        }

        prop_assert!(finished);
        prop_assert_eq!(completed.len(), spec.deps.len());
        prop_assert_eq!(scheduler.aggregate_progress(), 1.0);
        for i in 0..spec.deps.len() {
            prop_assert_eq!(scheduler.run_state_of(&job_name(i)), Some(JobRunState::Completed));
        }
    }

    #[test]
    fn update_dependencies_is_idempotent_for_any_graph(spec in dag_strategy(12)) {
        let mut scheduler = build(&spec);
        let before: Vec<Vec<String>> = (0..spec.deps.len())
            .map(|i| scheduler.dependencies_of(&job_name(i)).unwrap().to_vec())
            .collect();

        scheduler.update_dependencies().unwrap();
        let after: Vec<Vec<String>> = (0..spec.deps.len())
            .map(|i| scheduler.dependencies_of(&job_name(i)).unwrap().to_vec())
            .collect();

        prop_assert_eq!(before, after);
    }

    #[test]
    fn aggregate_progress_is_the_weighted_mean(
        weights in proptest::collection::vec(0.1f32..10.0, 1..8),
        progress in proptest::collection::vec(0.0f32..=1.0, 8),
    ) {
        let log = JobLog::default();
        let mut scheduler = JobScheduler::new();
        for (i, w) in weights.iter().enumerate() {
            scheduler.register(ScriptedJob::new(&job_name(i), &log).weight(*w)).unwrap();
        }
        scheduler.begin_run().unwrap();
        scheduler.tick();

        let mut weighted = 0.0f32;
        for (i, w) in weights.iter().enumerate() {
            scheduler.report_progress(&job_name(i), progress[i]).unwrap();
            weighted += progress[i] * w;
        }
        let expected = weighted / weights.iter().sum::<f32>();

        prop_assert!((scheduler.aggregate_progress() - expected).abs() < 1e-4);
    }
}
