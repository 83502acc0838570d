// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::*;
use crate::clock;
use crate::session::Role;

fn registry() -> Registry {
    Registry::new(clock::system())
}

#[tokio::test]
async fn activating_then_active_is_observable() {
    let registry = registry();
    registry.mark_activating("alice", Role::Developer).await;
    assert_eq!(registry.get("alice").await.unwrap().status, AgentStatus::Activating);

    registry.mark_active("alice", Role::Developer, None).await.expect("mark active");
    let record = registry.get("alice").await.expect("record");
    assert_eq!(record.status, AgentStatus::Active);
    assert!(record.ready_at.is_some());
}

#[tokio::test]
async fn ready_at_is_fixed_across_repeated_mark_active() {
    let registry = registry();
    registry.mark_active("alice", Role::Developer, None).await.expect("first");
    let first_ready_at = registry.get("alice").await.unwrap().ready_at;

    registry.mark_active("alice", Role::Developer, None).await.expect("second");
    let second_ready_at = registry.get("alice").await.unwrap().ready_at;
    assert_eq!(first_ready_at, second_ready_at);
}

#[tokio::test]
async fn conflicting_role_is_logged_and_swallowed() {
    let registry = registry();
    registry.mark_active("alice", Role::Developer, None).await.expect("first");
    let err = registry.mark_active("alice", Role::Qa, None).await.unwrap_err();
    assert!(matches!(err, RegistryError::Conflict { .. }));
    // Still active under the original role — a no-op, not a hard failure.
    assert_eq!(registry.get("alice").await.unwrap().role, Role::Developer);
}

#[tokio::test]
async fn remove_clears_the_record() {
    let registry = registry();
    registry.mark_active("alice", Role::Developer, None).await.expect("mark");
    registry.remove("alice").await;
    assert!(registry.get("alice").await.is_none());
}

#[tokio::test]
async fn wait_active_returns_immediately_if_already_active() {
    let registry = registry();
    registry.mark_active("alice", Role::Developer, None).await.expect("mark");
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let cancel = CancellationToken::new();
    registry.wait_active("alice", deadline, &cancel).await.expect("already active");
}

#[tokio::test]
async fn wait_active_is_released_by_mark_active() {
    let registry = Arc::new(registry());
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let cancel = CancellationToken::new();

    let waiter_registry = Arc::clone(&registry);
    let waiter_cancel = cancel.clone();
    let waiter = tokio::spawn(async move {
        waiter_registry.wait_active("alice", deadline, &waiter_cancel).await
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    registry.mark_active("alice", Role::Developer, None).await.expect("mark");

    assert!(waiter.await.expect("join").is_ok());
}

#[tokio::test]
async fn wait_active_releases_multiple_waiters_fifo() {
    let registry = Arc::new(registry());
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let cancel = CancellationToken::new();

    let mut handles = Vec::new();
    for _ in 0..3 {
        let registry = Arc::clone(&registry);
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            registry.wait_active("alice", deadline, &cancel).await
        }));
    }

    tokio::time::sleep(Duration::from_millis(10)).await;
    registry.mark_active("alice", Role::Developer, None).await.expect("mark");

    for handle in handles {
        assert!(handle.await.expect("join").is_ok());
    }
}

#[tokio::test]
async fn wait_active_times_out() {
    let registry = registry();
    registry.mark_activating("alice", Role::Developer).await;
    let deadline = tokio::time::Instant::now() + Duration::from_millis(20);
    let cancel = CancellationToken::new();
    let result = registry.wait_active("alice", deadline, &cancel).await;
    assert_eq!(result.unwrap_err(), WaitError::TimedOut);
}

#[tokio::test]
async fn wait_active_observes_cancellation() {
    let registry = registry();
    registry.mark_activating("alice", Role::Developer).await;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = registry.wait_active("alice", deadline, &cancel).await;
    assert_eq!(result.unwrap_err(), WaitError::Cancelled);
}

#[tokio::test]
async fn all_active_requires_every_named_session() {
    let registry = registry();
    registry.mark_active("alice", Role::Developer, None).await.expect("mark");
    registry.mark_activating("bob", Role::Qa).await;

    assert!(!registry.all_active(&["alice".to_string(), "bob".to_string()]).await);
    registry.mark_active("bob", Role::Qa, None).await.expect("mark");
    assert!(registry.all_active(&["alice".to_string(), "bob".to_string()]).await);
}

#[tokio::test]
async fn orchestrator_transitions_mirror_to_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    let state_file = Arc::new(
        crate::state_file::StateFile::open(path.clone(), "orc", clock::system().utc_now())
            .expect("open"),
    );
    let registry =
        Registry::new(clock::system()).with_orchestrator_mirror("orc".to_string(), state_file);

    registry.mark_activating("orc", Role::Orchestrator).await;
    let doc = crate::state_file::load(&path, "orc", clock::system().utc_now()).expect("load");
    assert_eq!(doc.orchestrator.status, AgentStatus::Activating);

    registry.mark_active("orc", Role::Orchestrator, None).await.expect("mark active");
    let doc = crate::state_file::load(&path, "orc", clock::system().utc_now()).expect("load");
    assert_eq!(doc.orchestrator.status, AgentStatus::Active);
}

#[tokio::test]
async fn killing_orchestrator_session_mirrors_to_inactive() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    let state_file = Arc::new(
        crate::state_file::StateFile::open(path.clone(), "orc", clock::system().utc_now())
            .expect("open"),
    );
    let registry =
        Registry::new(clock::system()).with_orchestrator_mirror("orc".to_string(), state_file);

    registry.mark_active("orc", Role::Orchestrator, None).await.expect("mark active");
    registry.mark_killed("orc").await;

    assert!(registry.get("orc").await.is_none());
    let doc = crate::state_file::load(&path, "orc", clock::system().utc_now()).expect("load");
    assert_eq!(doc.orchestrator.status, AgentStatus::Inactive);
}

#[tokio::test]
async fn killing_non_orchestrator_session_does_not_touch_mirror() {
    let registry = registry();
    registry.mark_active("alice", Role::Developer, None).await.expect("mark active");
    registry.mark_killed("alice").await;
    assert!(registry.get("alice").await.is_none());
}
