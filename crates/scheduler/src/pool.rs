use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::SchedulerError;
use crate::model::{JobOutcome, JobReport, PoolConfig};

/// Runs independent jobs with bounded parallelism.
///
/// Each job runs in its own tokio task, so a panic in one job is captured in
/// its report and never reaches siblings. Reports travel through a channel
/// that is drained only after every job has finished.
#[derive(Clone, Debug, Default)]
pub struct WorkerPool {
    config: PoolConfig,
}

impl WorkerPool {
    pub fn new(config: PoolConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Slots actually used for a run of `jobs` jobs.
    pub fn effective_concurrency(&self, jobs: usize) -> usize {
        self.config.max_concurrency.min(jobs).max(1)
    }

    /// Run every job and return one report per job, ordered by submission index.
    pub async fn run<J, R, F, Fut>(
        &self,
        jobs: Vec<J>,
        cancel: CancellationToken,
        work: F,
    ) -> Vec<JobReport<R>>
    where
        J: Send + 'static,
        R: Send + 'static,
        F: Fn(J) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let total = jobs.len();
        if total == 0 {
            return Vec::new();
        }
        let slots = Arc::new(Semaphore::new(self.effective_concurrency(total)));
        let work = Arc::new(work);
        let (tx, mut rx) = mpsc::unbounded_channel::<JobReport<R>>();
        let mut join_set = JoinSet::new();

        for (index, job) in jobs.into_iter().enumerate() {
            let delay = self.config.stagger * (index as u32 + 1);
            let slots = Arc::clone(&slots);
            let work = Arc::clone(&work);
            let cancel = cancel.clone();
            let tx = tx.clone();

            join_set.spawn(async move {
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    _ = sleep(delay) => Some(()),
                };
                if outcome.is_none() {
                    let _ = tx.send(cancelled(index));
                    return;
                }

                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = slots.acquire_owned() => permit.ok(),
                };
                let Some(permit) = permit else {
                    let _ = tx.send(cancelled(index));
                    return;
                };

                debug!(job = index, "pool job started");
                let handle = tokio::spawn((*work)(job));
                let outcome = match handle.await {
                    Ok(value) => JobOutcome::Completed(value),
                    Err(err) if err.is_panic() => {
                        let message = panic_message(err.into_panic());
                        warn!(job = index, %message, "pool job panicked");
                        JobOutcome::Failed(SchedulerError::Panicked(message))
                    }
                    Err(_) => JobOutcome::Failed(SchedulerError::Cancelled),
                };
                drop(permit);
                let _ = tx.send(JobReport { index, outcome });
            });
        }
        drop(tx);

        while let Some(joined) = join_set.join_next().await {
            if let Err(err) = joined {
                warn!(%err, "pool wrapper task ended abnormally");
            }
        }

        let mut reports = Vec::with_capacity(total);
        while let Some(report) = rx.recv().await {
            reports.push(report);
        }
        let mut seen = vec![false; total];
        for report in &reports {
            seen[report.index] = true;
        }
        for (index, reported) in seen.into_iter().enumerate() {
            if !reported {
                reports.push(JobReport {
                    index,
                    outcome: JobOutcome::Failed(SchedulerError::Lost),
                });
            }
        }
        reports.sort_by_key(|report| report.index);
        reports
    }
}

fn cancelled<R>(index: usize) -> JobReport<R> {
    JobReport {
        index,
        outcome: JobOutcome::Failed(SchedulerError::Cancelled),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    fn pool(max: usize) -> WorkerPool {
        WorkerPool::new(PoolConfig {
            max_concurrency: max,
            stagger: Duration::ZERO,
        })
    }

    #[tokio::test]
    async fn respects_concurrency_bound() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));

        let reports = pool(2)
            .run((0..6).collect(), CancellationToken::new(), move |n: u32| {
                let active = Arc::clone(&a);
                let peak = Arc::clone(&p);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(20)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    n * 10
                }
            })
            .await;

        assert_eq!(reports.len(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
        let values: Vec<_> = reports
            .into_iter()
            .filter_map(|r| r.outcome.completed())
            .collect();
        assert_eq!(values, vec![0, 10, 20, 30, 40, 50]);
    }

    #[tokio::test]
    async fn panic_is_isolated() {
        let reports = pool(3)
            .run(vec![1, 2, 3], CancellationToken::new(), |n: u32| async move {
                if n == 2 {
                    panic!("page {n} exploded");
                }
                n
            })
            .await;

        assert!(matches!(reports[0].outcome, JobOutcome::Completed(1)));
        match &reports[1].outcome {
            JobOutcome::Failed(SchedulerError::Panicked(msg)) => assert!(msg.contains("exploded")),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(matches!(reports[2].outcome, JobOutcome::Completed(3)));
    }

    #[tokio::test]
    async fn cancelled_jobs_report_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let reports = pool(2)
            .run(vec![1, 2], cancel, |n: u32| async move { n })
            .await;
        assert!(reports
            .iter()
            .all(|r| matches!(r.outcome, JobOutcome::Failed(SchedulerError::Cancelled))));
    }

    #[tokio::test(start_paused = true)]
    async fn starts_are_staggered_by_position() {
        let stagger = Duration::from_millis(100);
        let origin = Instant::now();
        let pool = WorkerPool::new(PoolConfig {
            max_concurrency: 3,
            stagger,
        });

        let reports = pool
            .run((0..3).collect(), CancellationToken::new(), move |k: u32| async move {
                (k, origin.elapsed())
            })
            .await;

        let starts: Vec<(u32, Duration)> = reports
            .into_iter()
            .filter_map(|r| r.outcome.completed())
            .collect();
        assert_eq!(starts.len(), 3);
        for (k, started) in &starts {
            assert!(*started >= stagger * (*k + 1), "job {k} started at {started:?}");
        }
        assert!(starts.windows(2).all(|w| w[1].1 - w[0].1 >= stagger));
    }

    #[test]
    fn concurrency_never_exceeds_job_count() {
        assert_eq!(pool(8).effective_concurrency(3), 3);
        assert_eq!(pool(2).effective_concurrency(5), 2);
        assert_eq!(pool(0).effective_concurrency(5), 1);
    }
}
