// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared black-box harness for the end-to-end orchestration scenarios.
//! Exercises the `agentmux` library directly through its public API,
//! against [`FakeDriver`] rather than a real terminal multiplexer.

use std::sync::Arc;
use std::time::Duration;

use agentmux::clock;
use agentmux::detector::Detector;
use agentmux::driver::fake::FakeDriver;
use agentmux::driver::TerminalDriver;
use agentmux::initializer::{AgentInitializer, LadderBudgets};
use agentmux::registry::Registry;
use agentmux::session::{Role, SessionName};
use agentmux::workflow::{StartProjectRequest, TeamMemberSpec, WorkflowEngine};
use tokio_util::sync::CancellationToken;

pub const ORCHESTRATOR: &str = "agentmux-orchestrator";

pub struct Harness {
    pub driver: Arc<FakeDriver>,
    pub detector: Arc<Detector>,
    pub registry: Arc<Registry>,
    pub engine: Arc<WorkflowEngine>,
}

/// Write the role prompt templates the Agent Initializer loads for every
/// descriptor it brings up.
pub fn write_role_prompts(dir: &std::path::Path) {
    for role in ["orchestrator", "developer", "qa", "tpm", "designer", "other"] {
        std::fs::write(dir.join(format!("{role}.md")), "You are {{SESSION_ID}} ({{MEMBER_ID}})")
            .expect("write prompt template");
    }
}

fn budgets() -> LadderBudgets {
    LadderBudgets {
        l1: Duration::from_millis(150),
        l2: Duration::from_millis(500),
        l3: Duration::from_millis(500),
        overall: Duration::from_secs(5),
    }
}

pub fn harness(prompt_dir: &std::path::Path) -> Harness {
    let clock = clock::system();
    let driver = Arc::new(FakeDriver::new(clock.clone()));
    let detector = Arc::new(Detector::new(
        driver.clone() as Arc<dyn TerminalDriver>,
        clock.clone(),
        Duration::from_millis(5),
        3,
        Duration::from_millis(20),
        50,
    ));
    let registry = Arc::new(Registry::new(clock.clone()));
    let initializer = Arc::new(AgentInitializer::new(
        driver.clone() as Arc<dyn TerminalDriver>,
        detector.clone(),
        registry.clone(),
        budgets(),
        "launch-cli --skip-dangerous-permissions".to_string(),
    ));
    let orchestrator_session = SessionName::new(ORCHESTRATOR).expect("valid session name");
    let engine = WorkflowEngine::new(
        driver.clone() as Arc<dyn TerminalDriver>,
        initializer,
        registry.clone(),
        clock,
        orchestrator_session,
        prompt_dir.to_path_buf(),
        Duration::from_secs(3),
        Duration::from_secs(3),
        Duration::from_millis(20),
        Duration::from_secs(2),
    );
    Harness { driver, detector, registry, engine }
}

pub fn member(id: &str, role: Role) -> TeamMemberSpec {
    TeamMemberSpec { id: id.to_string(), session_name: SessionName::new(id).expect("valid name"), role, skills: vec![] }
}

pub fn request(execution_id: &str, project_path: &std::path::Path, members: Vec<TeamMemberSpec>) -> StartProjectRequest {
    StartProjectRequest {
        execution_id: execution_id.to_string(),
        project_id: "proj-1".to_string(),
        project_name: "Demo".to_string(),
        project_path: project_path.to_path_buf(),
        team_id: "t1".to_string(),
        team_name: "Alpha".to_string(),
        requirements: "Build the thing.".to_string(),
        members,
        preserve_orchestrator: false,
    }
}

/// Background task standing in for the real `register-agent` hook: watches
/// each listed session and calls `mark_active` the moment the slash-probe
/// reports it interactive.
pub fn spawn_auto_register_all(
    detector: Arc<Detector>,
    registry: Arc<Registry>,
    sessions: Vec<(SessionName, Role, Option<String>)>,
    stop: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut pending = sessions;
        while !pending.is_empty() {
            if stop.is_cancelled() {
                return;
            }
            let mut still_pending = Vec::new();
            for (session_name, role, member_id) in pending {
                if detector.is_cli_interactive(&session_name).await {
                    let _ = registry.mark_active(session_name.as_str(), role, member_id).await;
                } else {
                    still_pending.push((session_name, role, member_id));
                }
            }
            pending = still_pending;
            if !pending.is_empty() {
                tokio::time::sleep(Duration::from_millis(15)).await;
            }
        }
    })
}
