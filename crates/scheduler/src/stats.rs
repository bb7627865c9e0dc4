use crate::error::SchedulerError;
use crate::model::{JobOutcome, JobReport};

/// Tally of how the jobs of one pool run ended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub jobs: usize,
    pub completed: usize,
    pub panicked: usize,
    pub cancelled: usize,
    pub lost: usize,
}

impl PoolStats {
    pub fn from_reports<R>(reports: &[JobReport<R>]) -> Self {
        let mut stats = Self {
            jobs: reports.len(),
            ..Self::default()
        };
        for report in reports {
            match &report.outcome {
                JobOutcome::Completed(_) => stats.completed += 1,
                JobOutcome::Failed(SchedulerError::Panicked(_)) => stats.panicked += 1,
                JobOutcome::Failed(SchedulerError::Cancelled) => stats.cancelled += 1,
                JobOutcome::Failed(SchedulerError::Lost) => stats.lost += 1,
            }
        }
        stats
    }

    /// Jobs whose work actually ran, to completion or to a panic.
    pub fn started(&self) -> usize {
        self.completed + self.panicked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(index: usize, outcome: JobOutcome<u32>) -> JobReport<u32> {
        JobReport { index, outcome }
    }

    #[test]
    fn counts_each_outcome_once() {
        let reports = vec![
            report(0, JobOutcome::Completed(1)),
            report(1, JobOutcome::Failed(SchedulerError::Panicked("boom".into()))),
            report(2, JobOutcome::Failed(SchedulerError::Cancelled)),
            report(3, JobOutcome::Completed(4)),
        ];
        let stats = PoolStats::from_reports(&reports);
        assert_eq!(
            stats,
            PoolStats {
                jobs: 4,
                completed: 2,
                panicked: 1,
                cancelled: 1,
                lost: 0,
            }
        );
        assert_eq!(stats.started(), 3);
    }

    #[test]
    fn separate_runs_do_not_accumulate() {
        let first = PoolStats::from_reports(&[report(0, JobOutcome::Completed(1))]);
        let second = PoolStats::from_reports(&[report(0, JobOutcome::Completed(2))]);
        assert_eq!(first.completed, 1);
        assert_eq!(second.completed, 1);
    }
}
