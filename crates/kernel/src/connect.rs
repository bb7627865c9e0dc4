//! One connection request per invocation, against the first unhandled profile.

use std::sync::Arc;

use actharvest_core_types::{TaskResult, TaskTarget};
use actharvest_state_center::{ProcessedSet, StateStore};
use agent_core::OracleConnector;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backlog::PersonTarget;
use crate::sessions::{run_scoped, OutreachScript, SessionTask};
use crate::summary::RunSummary;

#[derive(Debug, Clone)]
pub struct ConnectRun {
    pub target: Option<PersonTarget>,
    pub result: Option<TaskResult>,
    pub persist_failed: bool,
    pub summary: RunSummary,
}

pub struct ConnectController {
    connector: Arc<dyn OracleConnector>,
    task: SessionTask,
    script: OutreachScript,
}

impl ConnectController {
    pub fn new(connector: Arc<dyn OracleConnector>, task: SessionTask, script: OutreachScript) -> Self {
        Self {
            connector,
            task,
            script,
        }
    }

    /// First person whose identity is not yet in `set`.
    pub fn next_target<'a>(
        persons: &'a [PersonTarget],
        set: &ProcessedSet,
    ) -> Option<&'a PersonTarget> {
        persons.iter().find(|person| !set.contains(&person.identity))
    }

    pub async fn run(
        &self,
        persons: &[PersonTarget],
        set: &mut ProcessedSet,
        store: &dyn StateStore,
        cancel: &CancellationToken,
    ) -> ConnectRun {
        let mut run = ConnectRun {
            target: None,
            result: None,
            persist_failed: false,
            summary: RunSummary::default(),
        };
        let Some(person) = Self::next_target(persons, set).cloned() else {
            info!(persons = persons.len(), "every profile already contacted");
            run.summary.duplicate = persons.len();
            run.summary.total = set.len();
            return run;
        };
        run.summary.duplicate = persons
            .iter()
            .filter(|p| set.contains(&p.identity))
            .count();
        if cancel.is_cancelled() {
            run.summary.total = set.len();
            return run;
        }

        info!(
            person = person.person(),
            url = person.profile_url(),
            company = person.company.as_deref().unwrap_or("unknown"),
            "sending connection request"
        );
        let outcome = run_scoped(
            self.connector.as_ref(),
            person.profile_url(),
            &self.task,
            TaskTarget::Item(person.identity.to_string()),
            &self.script,
            set,
        )
        .await;

        if outcome.result.success() {
            set.insert(person.identity.clone());
            if let Err(err) = store.persist(set) {
                warn!(%err, "state not persisted after connection request");
                run.persist_failed = true;
            }
            run.summary.new = 1;
        } else {
            run.summary.failed = 1;
        }
        run.summary.total = set.len();
        run.target = Some(person);
        run.result = Some(outcome.result);
        run
    }
}
