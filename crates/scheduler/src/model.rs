use std::time::Duration;

use crate::error::SchedulerError;

#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Upper bound on jobs running at once.
    pub max_concurrency: usize,
    /// Start delay per job position; job k (1-indexed) waits `k * stagger`.
    pub stagger: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            stagger: Duration::from_millis(500),
        }
    }
}

/// How a single pooled job ended.
#[derive(Debug)]
pub enum JobOutcome<R> {
    Completed(R),
    Failed(SchedulerError),
}

impl<R> JobOutcome<R> {
    pub fn completed(self) -> Option<R> {
        match self {
            JobOutcome::Completed(value) => Some(value),
            JobOutcome::Failed(_) => None,
        }
    }
}

/// Outcome of the job submitted at `index`.
#[derive(Debug)]
pub struct JobReport<R> {
    pub index: usize,
    pub outcome: JobOutcome<R>,
}
