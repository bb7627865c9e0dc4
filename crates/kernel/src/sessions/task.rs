use std::path::PathBuf;
use std::time::Duration;

use actharvest_core_types::{Record, TaskId, TaskResult, TaskTarget};
use actharvest_state_center::ProcessedSet;
use agent_core::{OracleConnector, OracleSession};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use super::runner::{render_transcript, StepRunner, TranscriptEntry};
use crate::artifacts::ArtifactWriter;

/// Read-only inputs handed to a script.
#[derive(Clone, Copy)]
pub struct ScriptContext<'a> {
    pub target: &'a TaskTarget,
    /// Identities already handled; new records must not repeat them.
    pub known: &'a ProcessedSet,
}

/// What a script recovered from its session.
#[derive(Debug, Default)]
pub struct ScriptOutput {
    pub records: Vec<Record>,
    /// Candidates dropped as already known or repeated.
    pub duplicates: usize,
}

/// A fixed sequence of oracle instructions for one page or item.
///
/// `Err` carries the human-readable reason the task failed.
#[async_trait]
pub trait SessionScript: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(
        &self,
        steps: &mut StepRunner<'_>,
        ctx: ScriptContext<'_>,
    ) -> Result<ScriptOutput, String>;
}

/// A finished task plus counters that do not belong in the terminal result.
#[derive(Debug)]
pub struct TaskOutcome {
    pub result: TaskResult,
    pub duplicates: usize,
}

#[derive(Serialize)]
struct TaskSummary<'a> {
    task_id: &'a TaskId,
    script: &'a str,
    target: &'a TaskTarget,
    session_id: Option<&'a str>,
    success: bool,
    error: Option<&'a str>,
    records: &'a [Record],
    duplicates: usize,
    steps: usize,
    raw_artifact: Option<&'a PathBuf>,
}

/// Runs one script against one session and writes its audit artifacts.
///
/// A task never retries; the caller owns the session and any retry policy.
#[derive(Clone, Debug)]
pub struct SessionTask {
    artifacts: ArtifactWriter,
    instruction_timeout: Duration,
}

impl SessionTask {
    pub fn new(artifacts: ArtifactWriter, instruction_timeout: Duration) -> Self {
        Self {
            artifacts,
            instruction_timeout,
        }
    }

    pub async fn run(
        &self,
        target: TaskTarget,
        session: &mut dyn OracleSession,
        script: &dyn SessionScript,
        known: &ProcessedSet,
    ) -> TaskOutcome {
        let task_id = TaskId::for_target(&target);
        let session_id = session.id().to_string();
        let mut steps = StepRunner::new(session, self.instruction_timeout);
        let ctx = ScriptContext {
            target: &target,
            known,
        };
        let outcome = script.run(&mut steps, ctx).await;
        let transcript = steps.into_transcript();

        match &outcome {
            Ok(output) => info!(
                task = %task_id,
                page_target = %target,
                records = output.records.len(),
                duplicates = output.duplicates,
                "session task succeeded"
            ),
            Err(error) => warn!(task = %task_id, page_target = %target, %error, "session task failed"),
        }
        self.finish(task_id, target, Some(&session_id), script.name(), transcript, outcome)
    }

    /// Result for a task whose session never started.
    pub fn failed_to_start(
        &self,
        target: TaskTarget,
        script: &dyn SessionScript,
        error: impl Into<String>,
    ) -> TaskOutcome {
        let task_id = TaskId::for_target(&target);
        let error = error.into();
        warn!(task = %task_id, page_target = %target, %error, "session could not be opened");
        self.finish(task_id, target, None, script.name(), Vec::new(), Err(error))
    }

    fn finish(
        &self,
        task_id: TaskId,
        target: TaskTarget,
        session_id: Option<&str>,
        script: &str,
        transcript: Vec<TranscriptEntry>,
        outcome: Result<ScriptOutput, String>,
    ) -> TaskOutcome {
        let mut artifact_paths = Vec::new();
        let raw_artifact = match self.artifacts.write_once(
            &format!("{task_id}.raw.txt"),
            render_transcript(&transcript).as_bytes(),
        ) {
            Ok(path) => {
                artifact_paths.push(path.clone());
                Some(path)
            }
            Err(err) => {
                warn!(task = %task_id, %err, "raw artifact not written");
                None
            }
        };

        let (records, duplicates, error) = match outcome {
            Ok(output) => (output.records, output.duplicates, None),
            Err(error) => (Vec::new(), 0, Some(error)),
        };
        let summary = TaskSummary {
            task_id: &task_id,
            script,
            target: &target,
            session_id,
            success: error.is_none(),
            error: error.as_deref(),
            records: &records,
            duplicates,
            steps: transcript.len(),
            raw_artifact: raw_artifact.as_ref(),
        };
        match self
            .artifacts
            .write_json(&format!("{task_id}.summary.json"), &summary)
        {
            Ok(path) => artifact_paths.push(path),
            Err(err) => warn!(task = %task_id, %err, "summary artifact not written"),
        }

        let result = match error {
            None => TaskResult::succeeded(task_id, target, records, artifact_paths),
            Some(error) => TaskResult::failed(task_id, target, error, artifact_paths),
        };
        TaskOutcome { result, duplicates }
    }
}

/// Open a session, run one task on it, and stop the session on every path.
pub async fn run_scoped(
    connector: &dyn OracleConnector,
    starting_page: &str,
    task: &SessionTask,
    target: TaskTarget,
    script: &dyn SessionScript,
    known: &ProcessedSet,
) -> TaskOutcome {
    let mut session = match connector.open(starting_page).await {
        Ok(session) => session,
        Err(err) => return task.failed_to_start(target, script, err.to_string()),
    };
    let outcome = task.run(target, session.as_mut(), script, known).await;
    stop_session(session.as_mut()).await;
    outcome
}

/// Stop a session, logging rather than propagating failures.
pub async fn stop_session(session: &mut dyn OracleSession) {
    if let Err(err) = session.stop().await {
        warn!(session = session.id(), %err, "failed to stop oracle session");
    }
}
