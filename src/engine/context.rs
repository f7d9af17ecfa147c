// src/engine/context.rs

use tokio::sync::mpsc;

use crate::errors::{Result, StagehandError};
use crate::jobs::slot::validate_progress;
use crate::jobs::JobId;

use super::JobEvent;

/// Handle given to a job's process for reporting progress.
///
/// Cheap to clone; clones may be moved into spawned sub-tasks.
#[derive(Debug, Clone)]
pub struct JobContext {
    job: JobId,
    tx: mpsc::UnboundedSender<JobEvent>,
}

impl JobContext {
    pub fn new(job: JobId, tx: mpsc::UnboundedSender<JobEvent>) -> Self {
        Self { job, tx }
    }

    pub fn id(&self) -> &str {
        &self.job
    }

    /// Report progress in `0..=1`.
    ///
    /// The range is checked here so the job sees the error at the call site.
    pub fn set_progress(&self, value: f32) -> Result<()> {
        validate_progress(&self.job, value)?;
        self.tx
            .send(JobEvent::Progress {
                job: self.job.clone(),
                value,
            })
            .map_err(|_| StagehandError::ChannelClosed)
    }
}
