mod common;

use std::sync::Arc;
use std::time::Duration;

use actharvest_core_types::RecordIdentity;
use actharvest_kernel::backlog::read_persons;
use actharvest_kernel::{ConnectController, OutreachBudgets, OutreachScript};
use actharvest_state_center::{InMemoryStateStore, ProcessedSet};
use agent_core::{OracleReply, ScriptedConnector};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use common::session_task;

const PERSONS: &str = "ProfileUrl,Person,Company\nhttps://p/ada,Ada,Analytical\nhttps://p/alan,Alan,Bletchley\n";

fn controller(connector: &ScriptedConnector, dir: &std::path::Path) -> ConnectController {
    ConnectController::new(
        Arc::new(connector.clone()),
        session_task(dir),
        OutreachScript::new(OutreachBudgets::default(), Duration::ZERO),
    )
}

/// Answers yes/no questions by prompt; clicks always succeed.
fn profile(captcha: bool, direct: bool, more: bool, confirmed: bool) -> ScriptedConnector {
    ScriptedConnector::new(move |call| {
        let prompt = call.instruction.prompt.as_str();
        let answer = if prompt.contains("captcha") {
            captcha
        } else if prompt.contains("Connect button on this profile") {
            direct
        } else if prompt.contains("'More' button on this profile") {
            more
        } else if prompt.contains("menu that appeared") {
            true
        } else if prompt.contains("sent successfully") {
            confirmed
        } else {
            return Ok(OracleReply::text("Clicked."));
        };
        Ok(OracleReply::boolean(answer))
    })
}

#[tokio::test]
async fn connects_through_more_menu_and_marks_done() {
    let dir = tempdir().unwrap();
    let connector = profile(false, false, true, true);
    let persons = read_persons(PERSONS.as_bytes()).unwrap();
    let store = InMemoryStateStore::new();
    let mut set = ProcessedSet::new();

    let run = controller(&connector, dir.path())
        .run(&persons, &mut set, &store, &CancellationToken::new())
        .await;

    assert!(run.result.as_ref().unwrap().success());
    assert_eq!(run.target.unwrap().person(), "Ada");
    assert!(set.contains(&RecordIdentity::new("Ada", "https://p/ada").unwrap()));
    assert_eq!(store.persist_count(), 1);
    assert!(connector
        .calls()
        .iter()
        .any(|(_, prompt)| prompt == "Click the 'More' button"));
    assert_eq!(connector.stopped(), 1);
}

#[tokio::test]
async fn captcha_fails_without_marking() {
    let dir = tempdir().unwrap();
    let connector = profile(true, true, true, true);
    let persons = read_persons(PERSONS.as_bytes()).unwrap();
    let store = InMemoryStateStore::new();
    let mut set = ProcessedSet::new();

    let run = controller(&connector, dir.path())
        .run(&persons, &mut set, &store, &CancellationToken::new())
        .await;

    let result = run.result.unwrap();
    assert!(!result.success());
    assert!(result.error().unwrap().contains("captcha"));
    assert!(set.is_empty());
    assert_eq!(store.persist_count(), 0);
    assert_eq!(run.summary.failed, 1);
    assert_eq!(result.artifact_paths().len(), 2);
}

#[tokio::test]
async fn missing_connect_controls_is_a_failure() {
    let dir = tempdir().unwrap();
    let connector = profile(false, false, false, true);
    let persons = read_persons(PERSONS.as_bytes()).unwrap();
    let mut set = ProcessedSet::new();

    let run = controller(&connector, dir.path())
        .run(&persons, &mut set, &InMemoryStateStore::new(), &CancellationToken::new())
        .await;

    assert!(run
        .result
        .unwrap()
        .error()
        .unwrap()
        .contains("neither a Connect nor a More"));
}

#[tokio::test]
async fn picks_first_unhandled_profile() {
    let dir = tempdir().unwrap();
    let connector = profile(false, true, false, true);
    let persons = read_persons(PERSONS.as_bytes()).unwrap();
    let mut set = ProcessedSet::new();
    set.insert(RecordIdentity::new("Ada", "https://p/ada").unwrap());

    let run = controller(&connector, dir.path())
        .run(&persons, &mut set, &InMemoryStateStore::new(), &CancellationToken::new())
        .await;

    assert_eq!(run.target.unwrap().person(), "Alan");
    assert_eq!(run.summary.duplicate, 1);
    assert!(connector
        .calls()
        .iter()
        .all(|(page, _)| page == "https://p/alan"));
}

#[tokio::test]
async fn nothing_left_opens_no_session() {
    let dir = tempdir().unwrap();
    let connector = profile(false, true, false, true);
    let persons = read_persons(PERSONS.as_bytes()).unwrap();
    let mut set = ProcessedSet::new();
    for person in &persons {
        set.insert(person.identity.clone());
    }

    let run = controller(&connector, dir.path())
        .run(&persons, &mut set, &InMemoryStateStore::new(), &CancellationToken::new())
        .await;

    assert!(run.target.is_none());
    assert_eq!(connector.opened(), 0);
}
