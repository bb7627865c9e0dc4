mod common;

use std::sync::Arc;
use std::time::Duration;

use actharvest_kernel::{PaginationController, PaginationSettings, PaginationState, StopReason};
use actharvest_state_center::{FileStateStore, InMemoryStateStore, ProcessedSet, StateStore};
use agent_core::{AgentError, OracleReply, ScriptedConnector};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use common::{harvest_script, is_extraction, paging_responder, session_task};

fn settings(ceiling: u32, single_page: bool) -> PaginationSettings {
    PaginationSettings {
        start_url: "https://example.com/heroes".to_string(),
        iteration_ceiling: ceiling,
        single_page,
        continuation_step_budget: 5,
        page_turn_delay: Duration::ZERO,
    }
}

fn controller(
    connector: &ScriptedConnector,
    dir: &std::path::Path,
    settings: PaginationSettings,
) -> PaginationController {
    PaginationController::new(
        Arc::new(connector.clone()),
        session_task(dir),
        harvest_script(),
        settings,
        Duration::from_secs(5),
    )
}

#[tokio::test]
async fn always_yes_stops_at_iteration_ceiling() {
    let dir = tempdir().unwrap();
    let connector = ScriptedConnector::new(paging_responder("YES, clicking next"));
    let store = InMemoryStateStore::new();
    let mut set = ProcessedSet::new();

    let run = controller(&connector, dir.path(), settings(3, false))
        .run(&mut set, &store, &CancellationToken::new())
        .await;

    assert_eq!(run.terminal, PaginationState::Aborted);
    assert_eq!(run.reason, StopReason::IterationCeiling);
    assert_eq!(run.pages.len(), 3);
    assert_eq!(set.len(), 6);
    assert_eq!(run.summary.new, 6);
    assert_eq!(store.persist_count(), 3);
    assert_eq!(connector.opened(), 1);
    assert_eq!(connector.stopped(), 1);
}

#[tokio::test]
async fn negative_answer_is_done() {
    let dir = tempdir().unwrap();
    let connector = ScriptedConnector::new(paging_responder("NO - we have reached the end"));
    let store = InMemoryStateStore::new();
    let mut set = ProcessedSet::new();

    let run = controller(&connector, dir.path(), settings(20, false))
        .run(&mut set, &store, &CancellationToken::new())
        .await;

    assert_eq!(run.terminal, PaginationState::Done);
    assert_eq!(run.reason, StopReason::NoMorePages);
    assert_eq!(run.pages.len(), 1);
    assert_eq!(run.pages[0].continuation.as_deref(), Some("NO - we have reached the end"));
}

#[tokio::test]
async fn unclear_answer_stops_conservatively() {
    let dir = tempdir().unwrap();
    let connector = ScriptedConnector::new(paging_responder("I scrolled down a bit"));
    let mut set = ProcessedSet::new();

    let run = controller(&connector, dir.path(), settings(20, false))
        .run(&mut set, &InMemoryStateStore::new(), &CancellationToken::new())
        .await;

    assert_eq!(run.terminal, PaginationState::Done);
    assert_eq!(run.reason, StopReason::UnclearAnswer);
}

#[tokio::test]
async fn single_page_mode_never_asks_to_continue() {
    let dir = tempdir().unwrap();
    let connector = ScriptedConnector::new(paging_responder("YES"));
    let mut set = ProcessedSet::new();

    let run = controller(&connector, dir.path(), settings(20, true))
        .run(&mut set, &InMemoryStateStore::new(), &CancellationToken::new())
        .await;

    assert_eq!(run.reason, StopReason::SinglePage);
    assert!(connector
        .calls()
        .iter()
        .all(|(_, prompt)| !prompt.contains("pagination controls")));
}

#[tokio::test]
async fn failed_page_aborts_and_still_stops_session() {
    let dir = tempdir().unwrap();
    let connector = ScriptedConnector::new(|call| {
        if is_extraction(call) {
            Err(AgentError::instruction("page shows an error banner"))
        } else {
            Ok(OracleReply::text("ok"))
        }
    });
    let mut set = ProcessedSet::new();

    let run = controller(&connector, dir.path(), settings(20, false))
        .run(&mut set, &InMemoryStateStore::new(), &CancellationToken::new())
        .await;

    assert_eq!(run.terminal, PaginationState::Aborted);
    assert_eq!(run.reason, StopReason::TaskFailed);
    assert_eq!(run.summary.failed, 1);
    assert!(run.pages[0].error.as_deref().unwrap().contains("error banner"));
    assert_eq!(connector.stopped(), 1);
}

#[tokio::test]
async fn unavailable_session_is_reported() {
    let dir = tempdir().unwrap();
    let connector = ScriptedConnector::new(|_| Ok(OracleReply::text("unused")))
        .with_open_guard(|_| Err(AgentError::session_start("browser crashed")));
    let mut set = ProcessedSet::new();

    let run = controller(&connector, dir.path(), settings(20, false))
        .run(&mut set, &InMemoryStateStore::new(), &CancellationToken::new())
        .await;

    assert_eq!(run.reason, StopReason::SessionUnavailable);
    assert_eq!(run.terminal, PaginationState::Aborted);
    assert_eq!(run.summary.failed, 1);
}

#[tokio::test]
async fn second_run_only_adds_unseen_records() {
    let dir = tempdir().unwrap();
    let store = FileStateStore::new(dir.path().join("state/harvest.json"));

    let first = ScriptedConnector::new(paging_responder("NO"));
    let mut set = store.load();
    controller(&first, dir.path(), settings(20, false))
        .run(&mut set, &store, &CancellationToken::new())
        .await;
    assert_eq!(set.len(), 2);

    let second = ScriptedConnector::new(paging_responder("NO"));
    let mut reloaded = store.load();
    assert_eq!(reloaded, set);
    let run = controller(&second, dir.path(), settings(20, false))
        .run(&mut reloaded, &store, &CancellationToken::new())
        .await;
    assert_eq!(run.summary.new, 0);
    assert_eq!(run.summary.duplicate, 2);
    assert_eq!(run.summary.total, 2);
}

#[tokio::test]
async fn cancelled_before_start_opens_nothing() {
    let dir = tempdir().unwrap();
    let connector = ScriptedConnector::new(paging_responder("YES"));
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut set = ProcessedSet::new();

    let run = controller(&connector, dir.path(), settings(20, false))
        .run(&mut set, &InMemoryStateStore::new(), &cancel)
        .await;

    assert_eq!(run.reason, StopReason::Cancelled);
    assert_eq!(connector.opened(), 0);
}
