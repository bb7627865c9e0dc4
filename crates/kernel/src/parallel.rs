//! Parallel harvest over a known list of pages, one session per page.

use std::sync::Arc;

use actharvest_core_types::{Record, TaskId, TaskResult, TaskTarget};
use actharvest_scheduler::{JobOutcome, PoolStats, WorkerPool};
use actharvest_state_center::{ProcessedSet, StateStore};
use agent_core::OracleConnector;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::sessions::{run_scoped, HarvestScript, SessionTask, TaskOutcome};
use crate::summary::RunSummary;

/// Result of one page in a parallel run.
#[derive(Debug, Clone)]
pub struct PageResult {
    pub page: u32,
    pub result: TaskResult,
    /// Records this page added to the processed set.
    pub accepted: Vec<Record>,
}

#[derive(Debug, Clone)]
pub struct ParallelRun {
    /// Ordered by page number.
    pub pages: Vec<PageResult>,
    pub persisted: bool,
    pub summary: RunSummary,
}

impl ParallelRun {
    pub fn new_records(&self) -> impl Iterator<Item = &Record> {
        self.pages.iter().flat_map(|page| page.accepted.iter())
    }
}

/// Replace `{page}` in a listing URL template.
pub fn page_url(template: &str, page: u32) -> String {
    template.replace("{page}", &page.to_string())
}

pub struct ParallelController {
    connector: Arc<dyn OracleConnector>,
    task: Arc<SessionTask>,
    script: Arc<HarvestScript>,
    pool: WorkerPool,
    page_url_template: String,
}

impl ParallelController {
    pub fn new(
        connector: Arc<dyn OracleConnector>,
        task: SessionTask,
        script: HarvestScript,
        pool: WorkerPool,
        page_url_template: impl Into<String>,
    ) -> Self {
        Self {
            connector,
            task: Arc::new(task),
            script: Arc::new(script),
            pool,
            page_url_template: page_url_template.into(),
        }
    }

    /// Run one task per page, then merge in ascending page order and persist once.
    ///
    /// Tasks only see a snapshot of the set taken before the run; the set
    /// itself is touched by this method alone, after every task has finished.
    pub async fn run(
        &self,
        pages: Vec<u32>,
        set: &mut ProcessedSet,
        store: &dyn StateStore,
        cancel: CancellationToken,
    ) -> ParallelRun {
        let snapshot = Arc::new(set.clone());
        info!(
            pages = pages.len(),
            workers = self.pool.effective_concurrency(pages.len()),
            "starting parallel harvest"
        );

        let connector = Arc::clone(&self.connector);
        let task = Arc::clone(&self.task);
        let script = Arc::clone(&self.script);
        let template = self.page_url_template.clone();
        let reports = self
            .pool
            .run(pages.clone(), cancel, move |page: u32| {
                let connector = Arc::clone(&connector);
                let task = Arc::clone(&task);
                let script = Arc::clone(&script);
                let known = Arc::clone(&snapshot);
                let url = page_url(&template, page);
                async move {
                    run_scoped(
                        connector.as_ref(),
                        &url,
                        &task,
                        TaskTarget::Page(page),
                        script.as_ref(),
                        &known,
                    )
                    .await
                }
            })
            .await;

        let pool_stats = PoolStats::from_reports(&reports);
        let mut outcomes: Vec<(u32, TaskOutcome)> = reports
            .into_iter()
            .map(|report| {
                let page = pages[report.index];
                let outcome = match report.outcome {
                    JobOutcome::Completed(outcome) => outcome,
                    JobOutcome::Failed(err) => {
                        let target = TaskTarget::Page(page);
                        TaskOutcome {
                            result: TaskResult::failed(
                                TaskId::for_target(&target),
                                target,
                                err.to_string(),
                                Vec::new(),
                            ),
                            duplicates: 0,
                        }
                    }
                };
                (page, outcome)
            })
            .collect();
        outcomes.sort_by_key(|(page, _)| *page);

        let mut summary = RunSummary::default();
        let mut results = Vec::with_capacity(outcomes.len());
        for (page, outcome) in outcomes {
            let TaskOutcome { result, duplicates } = outcome;
            summary.duplicate += duplicates;
            if !result.success() {
                summary.failed += 1;
                warn!(page, error = result.error().unwrap_or_default(), "page task failed");
            }
            let merge = set.merge(result.records());
            summary.duplicate += merge.duplicates;
            summary.new += merge.accepted.len();
            results.push(PageResult {
                page,
                result,
                accepted: merge.accepted,
            });
        }

        let persisted = match store.persist(set) {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "state not persisted after parallel run");
                false
            }
        };
        summary.total = set.len();

        info!(
            summary = %summary,
            pool_started = pool_stats.started(),
            pool_completed = pool_stats.completed,
            pool_panicked = pool_stats.panicked,
            pool_cancelled = pool_stats.cancelled,
            "parallel harvest finished"
        );
        ParallelRun {
            pages: results,
            persisted,
            summary,
        }
    }
}
