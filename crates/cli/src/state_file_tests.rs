// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::Utc;
use tempfile::tempdir;

use super::*;

#[test]
fn missing_file_loads_as_fresh_inactive_orchestrator() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    let doc = load(&path, "agentmux-orchestrator", Utc::now()).expect("load");
    assert_eq!(doc.orchestrator.status, AgentStatus::Inactive);
    assert_eq!(doc.orchestrator.session_id, "agentmux-orchestrator");
    assert!(doc.teams.is_empty());
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    let mut doc = StateDocument::new("agentmux-orchestrator", Utc::now());
    doc.orchestrator.status = AgentStatus::Active;
    save(&path, &doc).expect("save");

    let reloaded = load(&path, "agentmux-orchestrator", Utc::now()).expect("load");
    assert_eq!(reloaded.orchestrator.status, AgentStatus::Active);
}

#[test]
fn save_leaves_no_temp_file_behind() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    let doc = StateDocument::new("agentmux-orchestrator", Utc::now());
    save(&path, &doc).expect("save");
    assert!(!dir.path().join("state.tmp").exists());
    assert!(path.exists());
}

#[test]
fn state_file_mirrors_orchestrator_transitions() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    let state = StateFile::open(path.clone(), "agentmux-orchestrator", Utc::now()).expect("open");

    state.set_orchestrator_status(AgentStatus::Active, Utc::now()).expect("set active");
    let on_disk = load(&path, "agentmux-orchestrator", Utc::now()).expect("reload");
    assert_eq!(on_disk.orchestrator.status, AgentStatus::Active);

    state.set_orchestrator_status(AgentStatus::Inactive, Utc::now()).expect("set inactive");
    let on_disk = load(&path, "agentmux-orchestrator", Utc::now()).expect("reload");
    assert_eq!(on_disk.orchestrator.status, AgentStatus::Inactive);
}

#[test]
fn upsert_team_then_update_member_status() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    let state = StateFile::open(path.clone(), "agentmux-orchestrator", Utc::now()).expect("open");

    state
        .upsert_team(TeamRecord {
            id: "t1".to_string(),
            members: vec![MemberRecord {
                id: "m1".to_string(),
                session_name: "alice".to_string(),
                role: "developer".to_string(),
                agent_status: AgentStatus::Inactive,
                working_status: WorkingStatus::Idle,
                ready_at: None,
            }],
        })
        .expect("upsert");

    let now = Utc::now();
    state.update_member_status("alice", AgentStatus::Active, Some(now)).expect("update");

    let snapshot = state.snapshot();
    let member = &snapshot.teams[0].members[0];
    assert_eq!(member.agent_status, AgentStatus::Active);
    assert_eq!(member.ready_at, Some(now));
}

#[test]
fn re_seeding_a_roster_preserves_already_active_members() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("state.json");
    let state = StateFile::open(path, "agentmux-orchestrator", Utc::now()).expect("open");

    let roster = || TeamRecord {
        id: "t1".to_string(),
        members: vec![MemberRecord {
            id: "m1".to_string(),
            session_name: "alice".to_string(),
            role: "developer".to_string(),
            agent_status: AgentStatus::Activating,
            working_status: WorkingStatus::Idle,
            ready_at: None,
        }],
    };
    state.upsert_team(roster()).expect("seed");

    let now = Utc::now();
    state.update_member_status("alice", AgentStatus::Active, Some(now)).expect("activate");

    // Re-seeding (as the workflow engine does at the start of every
    // `create_team_sessions` step, including an idempotent restart) must not
    // regress a member that already registered as active.
    state.upsert_team(roster()).expect("reseed");

    let snapshot = state.snapshot();
    let member = &snapshot.teams[0].members[0];
    assert_eq!(member.agent_status, AgentStatus::Active);
    assert_eq!(member.ready_at, Some(now));
}
