use std::sync::{Arc, Mutex};
use std::time::Duration;

use stagehand::engine::JobContext;
use stagehand::jobs::{Job, JobFuture, JobKind};

/// Shared, ordered record of job lifecycle events (`"setup:a"`,
/// `"start:a"`, `"done:a"`).
pub type JobLog = Arc<Mutex<Vec<String>>>;

/// A job that reports a fixed sequence of progress values, optionally
/// failing or panicking at the end.
pub struct ScriptedJob {
    id: String,
    kinds: Vec<JobKind>,
    needs: Vec<JobKind>,
    weight: f32,
    steps: Vec<f32>,
    fail_with: Option<String>,
    panics: bool,
    delay: Duration,
    log: JobLog,
    pub setups: usize,
}

impl ScriptedJob {
    /// A job providing the kind named like its id.
    pub fn new(id: &str, log: &JobLog) -> Self {
        Self {
            id: id.to_string(),
            kinds: vec![JobKind::new(id)],
            needs: Vec::new(),
            weight: 1.0,
            steps: Vec::new(),
            fail_with: None,
            panics: false,
            delay: Duration::from_millis(1),
            log: Arc::clone(log),
            setups: 0,
        }
    }

    pub fn provides(mut self, kind: &str) -> Self {
        self.kinds.push(JobKind::new(kind));
        self
    }

    pub fn needs(mut self, kind: &str) -> Self {
        self.needs.push(JobKind::new(kind));
        self
    }

    pub fn weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn progress_steps(mut self, steps: &[f32]) -> Self {
        self.steps = steps.to_vec();
        self
    }

    pub fn fails(mut self, reason: &str) -> Self {
        self.fail_with = Some(reason.to_string());
        self
    }

    pub fn panics(mut self) -> Self {
        self.panics = true;
        self
    }

    /// Pause before each progress step and before finishing.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Job for ScriptedJob {
    fn id(&self) -> &str {
        &self.id
    }

    fn kinds(&self) -> Vec<JobKind> {
        self.kinds.clone()
    }

    fn dependency_kinds(&self) -> Vec<JobKind> {
        self.needs.clone()
    }

    fn progress_weight(&self) -> f32 {
        self.weight
    }

    fn setup(&mut self) {
        self.setups += 1;
        self.log.lock().unwrap().push(format!("setup:{}", self.id));
    }

    fn process(&mut self, ctx: JobContext) -> JobFuture {
        let id = self.id.clone();
        let steps = self.steps.clone();
        let fail_with = self.fail_with.clone();
        let panics = self.panics;
        let delay = self.delay;
        let log = Arc::clone(&self.log);

        Box::pin(async move {
            log.lock().unwrap().push(format!("start:{id}"));

            for step in steps {
                tokio::time::sleep(delay).await;
                ctx.set_progress(step)?;
            }
            tokio::time::sleep(delay).await;

            if panics {
                panic!("scripted panic in {id}");
            }
            if let Some(reason) = fail_with {
                anyhow::bail!(reason);
            }

            log.lock().unwrap().push(format!("done:{id}"));
            Ok::<(), anyhow::Error>(())
        })
    }
}

/// Index of `event` in the log, for ordering assertions.
pub fn position(log: &JobLog, event: &str) -> Option<usize> {
    log.lock().unwrap().iter().position(|e| e == event)
}
