//! Sequential harvest driven by the oracle's own continuation answers.

use std::sync::Arc;
use std::time::Duration;

use actharvest_core_types::{Record, TaskTarget};
use actharvest_state_center::{ProcessedSet, StateStore};
use agent_core::{AnswerClass, Instruction, OracleConnector};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::sessions::{stop_session, HarvestScript, SessionTask, StepRunner};
use crate::summary::RunSummary;

const CONTINUATION_PROMPT: &str = "Look for pagination controls at the bottom of the page. \
Is there a \"Next\" button or a page number for the next page that can be clicked? \
If yes, answer \"YES\" and click it to go to the next page. \
If no, answer \"NO\" - we have reached the end.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationState {
    Idle,
    LoadingPage,
    Extracting,
    AskingContinuation,
    Done,
    Aborted,
}

/// Why a sequential run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Single-page mode finished its page.
    SinglePage,
    /// The oracle said there is no further page.
    NoMorePages,
    /// The continuation answer was empty or unclear.
    UnclearAnswer,
    /// The iteration ceiling was reached while the oracle still said yes.
    IterationCeiling,
    /// The session could not be opened.
    SessionUnavailable,
    /// A page task failed.
    TaskFailed,
    /// The continuation question itself failed.
    ContinuationFailed,
    Cancelled,
}

impl StopReason {
    /// Terminal state a reason leads to.
    pub fn terminal(self) -> PaginationState {
        match self {
            StopReason::SinglePage | StopReason::NoMorePages | StopReason::UnclearAnswer => {
                PaginationState::Done
            }
            _ => PaginationState::Aborted,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageReport {
    pub page: u32,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub new_records: usize,
    pub duplicates: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<AnswerClass>,
}

#[derive(Debug, Clone)]
pub struct PaginationRun {
    pub terminal: PaginationState,
    pub reason: StopReason,
    pub pages: Vec<PageReport>,
    /// Records accepted into the processed set during this run.
    pub new_records: Vec<Record>,
    pub persist_failures: usize,
    pub summary: RunSummary,
}

#[derive(Debug, Clone)]
pub struct PaginationSettings {
    pub start_url: String,
    pub iteration_ceiling: u32,
    pub single_page: bool,
    pub continuation_step_budget: u32,
    /// Pause after the oracle moves to the next page.
    pub page_turn_delay: Duration,
}

/// Tracks the current state and logs every transition.
struct Machine {
    state: PaginationState,
}

impl Machine {
    fn enter(&mut self, next: PaginationState, page: u32) {
        debug!(from = ?self.state, to = ?next, page, "pagination transition");
        self.state = next;
    }
}

pub struct PaginationController {
    connector: Arc<dyn OracleConnector>,
    task: SessionTask,
    script: HarvestScript,
    settings: PaginationSettings,
    instruction_timeout: Duration,
}

impl PaginationController {
    pub fn new(
        connector: Arc<dyn OracleConnector>,
        task: SessionTask,
        script: HarvestScript,
        settings: PaginationSettings,
        instruction_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            task,
            script,
            settings,
            instruction_timeout,
        }
    }

    /// Harvest pages one after another on a single session.
    ///
    /// The set is merged and persisted after every page. The session is
    /// stopped on every exit path.
    pub async fn run(
        &self,
        set: &mut ProcessedSet,
        store: &dyn StateStore,
        cancel: &CancellationToken,
    ) -> PaginationRun {
        let mut machine = Machine {
            state: PaginationState::Idle,
        };
        let mut run = PaginationRun {
            terminal: PaginationState::Idle,
            reason: StopReason::Cancelled,
            pages: Vec::new(),
            new_records: Vec::new(),
            persist_failures: 0,
            summary: RunSummary::default(),
        };
        let mut page = 1u32;

        if cancel.is_cancelled() {
            return self.finish(run, machine, set, StopReason::Cancelled, page);
        }

        machine.enter(PaginationState::LoadingPage, page);
        let mut session = match self.connector.open(&self.settings.start_url).await {
            Ok(session) => session,
            Err(err) => {
                warn!(%err, url = %self.settings.start_url, "could not open harvest session");
                run.summary.failed += 1;
                run.pages.push(PageReport {
                    page,
                    success: false,
                    error: Some(err.to_string()),
                    new_records: 0,
                    duplicates: 0,
                    continuation: None,
                    answer: None,
                });
                return self.finish(run, machine, set, StopReason::SessionUnavailable, page);
            }
        };

        let reason = loop {
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            machine.enter(PaginationState::Extracting, page);
            let outcome = self
                .task
                .run(TaskTarget::Page(page), session.as_mut(), &self.script, set)
                .await;
            let mut report = PageReport {
                page,
                success: outcome.result.success(),
                error: outcome.result.error().map(str::to_string),
                new_records: 0,
                duplicates: outcome.duplicates,
                continuation: None,
                answer: None,
            };
            if !outcome.result.success() {
                run.summary.failed += 1;
                run.pages.push(report);
                break StopReason::TaskFailed;
            }

            let merge = set.merge(outcome.result.records());
            report.new_records = merge.accepted.len();
            report.duplicates += merge.duplicates;
            run.summary.duplicate += report.duplicates;
            info!(
                page,
                new = merge.accepted.len(),
                total = set.len(),
                "page merged into processed set"
            );
            run.new_records.extend(merge.accepted);
            if let Err(err) = store.persist(set) {
                warn!(page, %err, "state not persisted; keeping in-memory copy");
                run.persist_failures += 1;
            }

            if self.settings.single_page {
                run.pages.push(report);
                break StopReason::SinglePage;
            }

            machine.enter(PaginationState::AskingContinuation, page);
            let mut steps = StepRunner::new(session.as_mut(), self.instruction_timeout);
            let asked = steps
                .invoke(
                    Instruction::new(CONTINUATION_PROMPT)
                        .with_step_budget(self.settings.continuation_step_budget),
                )
                .await;
            let reply = match asked {
                Ok(reply) => reply,
                Err(err) => {
                    report.error = Some(err.to_string());
                    run.pages.push(report);
                    break StopReason::ContinuationFailed;
                }
            };
            let answer = agent_core::classify_reply(&reply);
            report.continuation = Some(reply.raw_text);
            report.answer = Some(answer);
            run.pages.push(report);

            match answer {
                AnswerClass::Negative => break StopReason::NoMorePages,
                AnswerClass::Unparseable => break StopReason::UnclearAnswer,
                AnswerClass::Affirmative if page >= self.settings.iteration_ceiling => {
                    warn!(
                        ceiling = self.settings.iteration_ceiling,
                        "iteration ceiling reached; stopping"
                    );
                    break StopReason::IterationCeiling;
                }
                AnswerClass::Affirmative => {
                    page += 1;
                    machine.enter(PaginationState::LoadingPage, page);
                    if !self.settings.page_turn_delay.is_zero() {
                        tokio::time::sleep(self.settings.page_turn_delay).await;
                    }
                }
            }
        };

        stop_session(session.as_mut()).await;
        self.finish(run, machine, set, reason, page)
    }

    fn finish(
        &self,
        mut run: PaginationRun,
        mut machine: Machine,
        set: &ProcessedSet,
        reason: StopReason,
        page: u32,
    ) -> PaginationRun {
        machine.enter(reason.terminal(), page);
        run.terminal = machine.state;
        run.reason = reason;
        run.summary.new = run.new_records.len();
        run.summary.total = set.len();
        info!(
            terminal = ?run.terminal,
            reason = ?run.reason,
            pages = run.pages.len(),
            summary = %run.summary,
            "sequential harvest finished"
        );
        run
    }
}
