// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Six end-to-end scenarios for one orchestrator standing up a project
//! team, exercised black-box against a [`agentmux::driver::fake::FakeDriver`].

mod common;

use std::time::Duration;

use agentmux::registry::AgentStatus;
use agentmux::session::{Role, SessionName};
use agentmux::workflow::{ExecutionStatus, StepStatus};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use common::{harness, member, request, spawn_auto_register_all, write_role_prompts, ORCHESTRATOR};

#[tokio::test]
async fn happy_path_brings_up_a_fresh_orchestrator_and_team() {
    let dir = tempdir().expect("tempdir");
    write_role_prompts(dir.path());
    let h = harness(dir.path());

    let members = vec![member("alice", Role::Developer), member("bob", Role::Qa)];
    let stop = CancellationToken::new();
    let watched = vec![
        (SessionName::new(ORCHESTRATOR).unwrap(), Role::Orchestrator, None),
        (members[0].session_name.clone(), Role::Developer, Some("alice".to_string())),
        (members[1].session_name.clone(), Role::Qa, Some("bob".to_string())),
    ];
    let registrar = spawn_auto_register_all(h.detector.clone(), h.registry.clone(), watched, stop.clone());

    let execution = h.engine.start_project(request("demo-t1", dir.path(), members)).await;
    stop.cancel();
    let _ = registrar.await;

    assert_eq!(execution.status, ExecutionStatus::Succeeded);
    for step in &execution.steps {
        assert_eq!(step.status, StepStatus::Succeeded, "step {} should have succeeded", step.id);
    }
    assert_eq!(h.driver.create_session_calls(), 3);

    for name in [ORCHESTRATOR, "alice", "bob"] {
        let record = h.registry.get(name).await.expect("registered");
        assert_eq!(record.status, AgentStatus::Active);
    }
}

#[tokio::test]
async fn orchestrator_already_live_skips_the_create_step() {
    let dir = tempdir().expect("tempdir");
    write_role_prompts(dir.path());
    let h = harness(dir.path());

    let orchestrator_session = SessionName::new(ORCHESTRATOR).unwrap();
    h.driver.create_session(&orchestrator_session, dir.path(), None).await.expect("pre-create orchestrator");
    h.driver.set_interactive(orchestrator_session.as_str(), true).await;

    let members = vec![member("alice", Role::Developer)];
    let stop = CancellationToken::new();
    let watched = vec![
        (orchestrator_session.clone(), Role::Orchestrator, None),
        (members[0].session_name.clone(), Role::Developer, Some("alice".to_string())),
    ];
    let registrar = spawn_auto_register_all(h.detector.clone(), h.registry.clone(), watched, stop.clone());

    let execution = h.engine.start_project(request("demo-t2", dir.path(), members)).await;
    stop.cancel();
    let _ = registrar.await;

    assert_eq!(execution.status, ExecutionStatus::Succeeded);
    assert_eq!(execution.steps[0].status, StepStatus::Succeeded); // check_orchestrator
    assert_eq!(execution.steps[1].status, StepStatus::Skipped); // create_orchestrator
    for step in &execution.steps[2..] {
        assert_eq!(step.status, StepStatus::Succeeded);
    }
    assert_eq!(h.driver.create_session_calls(), 2); // the pre-create plus alice's session
    assert_eq!(h.driver.kill_session_calls(), 0);
}

#[tokio::test]
async fn a_cli_that_never_turns_interactive_aborts_before_the_team_is_touched() {
    let dir = tempdir().expect("tempdir");
    write_role_prompts(dir.path());
    let h = harness(dir.path());

    // No registrar: the fake CLI never reports interactive, so every rung of
    // the escalation ladder times out and initialize_claude fails outright.
    let execution = h.engine.start_project(request("demo-t3", dir.path(), vec![])).await;

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(execution.steps[0].status, StepStatus::Succeeded); // check_orchestrator
    assert_eq!(execution.steps[1].status, StepStatus::Succeeded); // create_orchestrator
    assert_eq!(execution.steps[2].status, StepStatus::Failed); // initialize_claude
    assert!(execution.steps[2].error.is_some());
    for step in &execution.steps[3..] {
        assert_eq!(step.status, StepStatus::Pending);
    }
}

#[tokio::test]
async fn one_broken_team_member_fails_the_step_without_rolling_back_the_healthy_one() {
    let dir = tempdir().expect("tempdir");
    write_role_prompts(dir.path());
    let h = harness(dir.path());

    let orchestrator_session = SessionName::new(ORCHESTRATOR).unwrap();
    let healthy = member("alice", Role::Developer);
    let broken = member("bob", Role::Qa);

    let stop = CancellationToken::new();
    let watched = vec![
        (orchestrator_session, Role::Orchestrator, None),
        (healthy.session_name.clone(), Role::Developer, Some("alice".to_string())),
        // bob is deliberately left off the watch list: his CLI never
        // reports interactive, so his initializer call runs out the ladder.
    ];
    let registrar = spawn_auto_register_all(h.detector.clone(), h.registry.clone(), watched, stop.clone());

    let execution = h.engine.start_project(request("demo-t4", dir.path(), vec![healthy, broken])).await;
    stop.cancel();
    let _ = registrar.await;

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(execution.steps[3].status, StepStatus::Failed); // create_team_sessions
    assert_eq!(execution.steps[4].status, StepStatus::Pending);
    assert_eq!(execution.steps[5].status, StepStatus::Pending);

    let alice = h.registry.get("alice").await.expect("alice stayed active");
    assert_eq!(alice.status, AgentStatus::Active);
    let bob_status = h.registry.get("bob").await.map(|r| r.status);
    assert_ne!(bob_status, Some(AgentStatus::Active));
}

#[tokio::test]
async fn cancelling_mid_flight_stops_before_team_sessions_start() {
    let dir = tempdir().expect("tempdir");
    write_role_prompts(dir.path());
    let h = harness(dir.path());

    let orchestrator_session = SessionName::new(ORCHESTRATOR).unwrap();
    let stop = CancellationToken::new();
    let watched = vec![(orchestrator_session, Role::Orchestrator, None)];
    let registrar = spawn_auto_register_all(h.detector.clone(), h.registry.clone(), watched, stop.clone());

    let members = vec![member("alice", Role::Developer)];
    let engine = h.engine.clone();
    let execution_fut = engine.start_project(request("demo-t5", dir.path(), members));

    let canceller_engine = h.engine.clone();
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        canceller_engine.cancel("demo-t5").await
    });

    let execution = execution_fut.await;
    let cancelled = canceller.await.expect("canceller task");
    stop.cancel();
    let _ = registrar.await;

    assert!(cancelled);
    assert_eq!(execution.status, ExecutionStatus::Cancelled);
    assert_eq!(execution.steps[2].status, StepStatus::Succeeded); // initialize_claude finished
    assert_eq!(execution.steps[3].status, StepStatus::Pending); // create_team_sessions never started
    assert_eq!(h.driver.kill_session_calls(), 0);
}

#[tokio::test]
async fn restarting_an_already_settled_project_is_fast_and_touches_nothing() {
    let dir = tempdir().expect("tempdir");
    write_role_prompts(dir.path());
    let h = harness(dir.path());

    let orchestrator_session = SessionName::new(ORCHESTRATOR).unwrap();
    h.driver.create_session(&orchestrator_session, dir.path(), None).await.expect("pre-create orchestrator");
    h.driver.set_interactive(orchestrator_session.as_str(), true).await;
    h.registry.mark_active(orchestrator_session.as_str(), Role::Orchestrator, None).await.expect("mark active");

    let alice = member("alice", Role::Developer);
    h.driver.create_session(&alice.session_name, dir.path(), None).await.expect("pre-create alice");
    h.driver.set_interactive(alice.session_name.as_str(), true).await;
    h.registry.mark_active("alice", Role::Developer, Some("alice".to_string())).await.expect("mark active");

    let started = std::time::Instant::now();
    let execution = h.engine.start_project(request("demo-t1", dir.path(), vec![alice])).await;
    let elapsed = started.elapsed();

    assert_eq!(execution.status, ExecutionStatus::Succeeded);
    for step in &execution.steps {
        assert_ne!(step.status, StepStatus::Failed);
    }
    assert_eq!(h.driver.create_session_calls(), 2); // only the two pre-creates above
    assert_eq!(h.driver.kill_session_calls(), 0);
    assert!(elapsed < Duration::from_secs(10), "idempotent restart took {elapsed:?}");
}
