// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tempfile::tempdir;

use super::*;
use crate::clock;
use crate::state_file::StateFile;

#[tokio::test]
async fn active_status_updates_the_registry() {
    let registry = Registry::new(clock::system());
    let request = RegisterAgentRequest {
        session_name: "dev-1".to_string(),
        role: Role::Developer,
        member_id: Some("m1".to_string()),
        status: "active".to_string(),
    };

    register_agent(&registry, None, request).await;

    let record = registry.get("dev-1").await.expect("record");
    assert_eq!(record.status, AgentStatus::Active);
    assert_eq!(record.member_id, Some("m1".to_string()));
}

#[tokio::test]
async fn non_active_status_is_ignored() {
    let registry = Registry::new(clock::system());
    let request = RegisterAgentRequest {
        session_name: "dev-2".to_string(),
        role: Role::Developer,
        member_id: None,
        status: "booting".to_string(),
    };

    register_agent(&registry, None, request).await;

    assert_eq!(registry.get("dev-2").await, None);
}

#[tokio::test]
async fn active_status_mirrors_team_member_into_state_file() {
    let dir = tempdir().expect("tempdir");
    let state_path = dir.path().join("state.json");
    let clock = clock::system();
    let state_file =
        StateFile::open(state_path, "agentmux-orchestrator", clock.utc_now()).expect("open state file");
    state_file
        .upsert_team(crate::state_file::TeamRecord {
            id: "t1".to_string(),
            members: vec![crate::state_file::MemberRecord {
                id: "m1".to_string(),
                session_name: "dev-1".to_string(),
                role: "developer".to_string(),
                agent_status: AgentStatus::Activating,
                working_status: crate::state_file::WorkingStatus::Idle,
                ready_at: None,
            }],
        })
        .expect("seed roster");

    let registry = Registry::new(clock);
    let request = RegisterAgentRequest {
        session_name: "dev-1".to_string(),
        role: Role::Developer,
        member_id: Some("m1".to_string()),
        status: "active".to_string(),
    };

    register_agent(&registry, Some(&state_file), request).await;

    let snapshot = state_file.snapshot();
    let member = &snapshot.teams[0].members[0];
    assert_eq!(member.agent_status, AgentStatus::Active);
    assert!(member.ready_at.is_some());
}
