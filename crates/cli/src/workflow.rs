// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project-Start Workflow Engine (C5): composes the Terminal Driver, CLI
//! Readiness Detector, Agent Initializer, and Registration Registry into the
//! fixed six-step recipe that stands up an orchestrator and its team for one
//! project, with cancellation and an event bus.
//!
//! The per-execution event fan-out is publish-and-forget: publishers never
//! check for subscribers, and a `send` with no receivers is silently
//! dropped.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::clock::SharedClock;
use crate::driver::{Key, TerminalDriver};
use crate::error::{ErrorCode, WorkflowFailure};
use crate::initializer::AgentInitializer;
use crate::prompt::{ProjectStartPrompt, RosterMember};
use crate::registry::{AgentStatus, Registry};
use crate::session::{AgentDescriptor, Role, SessionName};
use crate::state_file::{MemberRecord, StateFile, TeamRecord, WorkingStatus};

/// Lifecycle status of a [`WorkflowExecution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// Lifecycle status of one [`WorkflowStep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

/// One step of the fixed six-step recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: String,
    pub label: String,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<WorkflowFailure>,
    pub detail: Option<String>,
}

/// The full record of one `start_project` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub execution_id: String,
    pub project_id: String,
    pub team_id: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub steps: Vec<WorkflowStep>,
}

/// Published on every execution/step status transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum WorkflowEvent {
    #[serde(rename = "execution")]
    Execution { execution_id: String, status: ExecutionStatus, at: DateTime<Utc> },
    #[serde(rename = "step")]
    Step {
        execution_id: String,
        step_id: String,
        status: StepStatus,
        at: DateTime<Utc>,
        detail: Option<String>,
    },
}

/// One team member the orchestrator's project-start prompt should address,
/// and the descriptor the Agent Initializer will bring up.
#[derive(Debug, Clone)]
pub struct TeamMemberSpec {
    pub id: String,
    pub session_name: SessionName,
    pub role: Role,
    pub skills: Vec<String>,
}

/// Everything `start_project` needs for one (project, team) pair.
#[derive(Debug, Clone)]
pub struct StartProjectRequest {
    pub execution_id: String,
    pub project_id: String,
    pub project_name: String,
    pub project_path: PathBuf,
    pub team_id: String,
    pub team_name: String,
    pub requirements: String,
    pub members: Vec<TeamMemberSpec>,
    pub preserve_orchestrator: bool,
}

const STEP_CHECK_ORCHESTRATOR: &str = "check_orchestrator";
const STEP_CREATE_ORCHESTRATOR: &str = "create_orchestrator";
const STEP_INITIALIZE_CLAUDE: &str = "initialize_claude";
const STEP_CREATE_TEAM_SESSIONS: &str = "create_team_sessions";
const STEP_SEND_PROJECT_PROMPT: &str = "send_project_prompt";
const STEP_MONITOR_SETUP: &str = "monitor_setup";

fn step_definitions() -> Vec<WorkflowStep> {
    [
        (STEP_CHECK_ORCHESTRATOR, "Check whether the orchestrator session is already live"),
        (STEP_CREATE_ORCHESTRATOR, "Create the orchestrator session"),
        (STEP_INITIALIZE_CLAUDE, "Bring the orchestrator's AI CLI to an interactive, prompted state"),
        (STEP_CREATE_TEAM_SESSIONS, "Bring up every team member's session"),
        (STEP_SEND_PROJECT_PROMPT, "Deliver the project-start prompt to the orchestrator"),
        (STEP_MONITOR_SETUP, "Wait for the whole team to register as active"),
    ]
    .into_iter()
    .map(|(id, label)| WorkflowStep {
        id: id.to_string(),
        label: label.to_string(),
        status: StepStatus::Pending,
        started_at: None,
        finished_at: None,
        error: None,
        detail: None,
    })
    .collect()
}

fn step_index(id: &str) -> usize {
    [
        STEP_CHECK_ORCHESTRATOR,
        STEP_CREATE_ORCHESTRATOR,
        STEP_INITIALIZE_CLAUDE,
        STEP_CREATE_TEAM_SESSIONS,
        STEP_SEND_PROJECT_PROMPT,
        STEP_MONITOR_SETUP,
    ]
    .iter()
    .position(|candidate| *candidate == id)
    .unwrap_or(0)
}

/// Project-Start Workflow Engine (C5).
pub struct WorkflowEngine {
    driver: Arc<dyn TerminalDriver>,
    initializer: Arc<AgentInitializer>,
    registry: Arc<Registry>,
    clock: SharedClock,
    orchestrator_session: SessionName,
    prompt_dir: PathBuf,
    orchestrator_init_deadline: Duration,
    member_init_deadline: Duration,
    monitor_poll_interval: Duration,
    monitor_deadline: Duration,
    executions: Mutex<HashMap<String, WorkflowExecution>>,
    cancels: Mutex<HashMap<String, CancellationToken>>,
    events_tx: broadcast::Sender<WorkflowEvent>,
    /// JSON mirror for team rosters. `None` in tests that don't exercise
    /// persistence.
    state_file: Option<Arc<StateFile>>,
}

impl WorkflowEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        driver: Arc<dyn TerminalDriver>,
        initializer: Arc<AgentInitializer>,
        registry: Arc<Registry>,
        clock: SharedClock,
        orchestrator_session: SessionName,
        prompt_dir: PathBuf,
        orchestrator_init_deadline: Duration,
        member_init_deadline: Duration,
        monitor_poll_interval: Duration,
        monitor_deadline: Duration,
    ) -> Arc<Self> {
        Self::new_with_state_file(
            driver,
            initializer,
            registry,
            clock,
            orchestrator_session,
            prompt_dir,
            orchestrator_init_deadline,
            member_init_deadline,
            monitor_poll_interval,
            monitor_deadline,
            None,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new_with_state_file(
        driver: Arc<dyn TerminalDriver>,
        initializer: Arc<AgentInitializer>,
        registry: Arc<Registry>,
        clock: SharedClock,
        orchestrator_session: SessionName,
        prompt_dir: PathBuf,
        orchestrator_init_deadline: Duration,
        member_init_deadline: Duration,
        monitor_poll_interval: Duration,
        monitor_deadline: Duration,
        state_file: Option<Arc<StateFile>>,
    ) -> Arc<Self> {
        let (events_tx, _rx) = broadcast::channel(256);
        Arc::new(Self {
            driver,
            initializer,
            registry,
            clock,
            orchestrator_session,
            prompt_dir,
            orchestrator_init_deadline,
            member_init_deadline,
            monitor_poll_interval,
            monitor_deadline,
            executions: Mutex::new(HashMap::new()),
            cancels: Mutex::new(HashMap::new()),
            events_tx,
            state_file,
        })
    }

    pub fn from_config(
        driver: Arc<dyn TerminalDriver>,
        initializer: Arc<AgentInitializer>,
        registry: Arc<Registry>,
        clock: SharedClock,
        config: &crate::config::Config,
    ) -> Arc<Self> {
        Self::from_config_with_state_file(driver, initializer, registry, clock, config, None)
    }

    pub fn from_config_with_state_file(
        driver: Arc<dyn TerminalDriver>,
        initializer: Arc<AgentInitializer>,
        registry: Arc<Registry>,
        clock: SharedClock,
        config: &crate::config::Config,
        state_file: Option<Arc<StateFile>>,
    ) -> Arc<Self> {
        // `Config::validate` rejects an invalid `orchestrator_session` before
        // an `Application` is ever built, so this always resolves to the
        // configured name in practice; the fallback only guards callers that
        // skip validation (e.g. tests constructing a `Config` by hand).
        let orchestrator_session = SessionName::new(config.orchestrator_session.clone())
            .unwrap_or_else(|_| SessionName::fallback());
        Self::new_with_state_file(
            driver,
            initializer,
            registry,
            clock,
            orchestrator_session,
            config.prompt_dir.clone(),
            config.orchestrator_init_deadline(),
            config.member_init_deadline(),
            config.monitor_poll_interval(),
            config.monitor_deadline(),
            state_file,
        )
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events_tx.subscribe()
    }

    /// Snapshot of a (possibly still in-flight) execution.
    pub async fn execution(&self, execution_id: &str) -> Option<WorkflowExecution> {
        self.executions.lock().await.get(execution_id).cloned()
    }

    /// Request cancellation of an in-flight execution. Returns `false` if the
    /// execution is unknown or was already cancelled — idempotent, calling
    /// this twice never double-cancels.
    pub async fn cancel(&self, execution_id: &str) -> bool {
        let cancels = self.cancels.lock().await;
        match cancels.get(execution_id) {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Run the fixed six-step recipe to completion (or until cancelled /
    /// aborted by a step failure) and return the final execution record.
    pub async fn start_project(&self, request: StartProjectRequest) -> WorkflowExecution {
        let started_at = self.clock.utc_now();
        let mut execution = WorkflowExecution {
            execution_id: request.execution_id.clone(),
            project_id: request.project_id.clone(),
            team_id: request.team_id.clone(),
            status: ExecutionStatus::Running,
            started_at,
            finished_at: None,
            steps: step_definitions(),
        };

        let cancel = CancellationToken::new();
        self.cancels.lock().await.insert(execution.execution_id.clone(), cancel.clone());
        self.publish_execution(&execution).await;

        let mut stop: Option<ExecutionStatus> = None;
        let mut orchestrator_already_live = false;

        if self.should_stop(&cancel, &mut stop) {
            return self.finalize(execution, stop).await;
        }
        self.run_check_orchestrator(&mut execution, &mut orchestrator_already_live, &mut stop).await;

        if !self.should_stop(&cancel, &mut stop) {
            self.run_create_orchestrator(&mut execution, &request, orchestrator_already_live, &mut stop).await;
        }

        if !self.should_stop(&cancel, &mut stop) {
            self.run_initialize_claude(&mut execution, &request, &mut stop).await;
        }

        if !self.should_stop(&cancel, &mut stop) {
            self.run_create_team_sessions(&mut execution, &request, &mut stop).await;
        }

        if !self.should_stop(&cancel, &mut stop) {
            self.run_send_project_prompt(&mut execution, &request, &mut stop).await;
        }

        if !self.should_stop(&cancel, &mut stop) {
            self.run_monitor_setup(&mut execution, &request, &mut stop).await;
        }

        self.finalize(execution, stop).await
    }

    fn should_stop(&self, cancel: &CancellationToken, stop: &mut Option<ExecutionStatus>) -> bool {
        if stop.is_none() && cancel.is_cancelled() {
            *stop = Some(ExecutionStatus::Cancelled);
        }
        stop.is_some()
    }

    async fn finalize(&self, mut execution: WorkflowExecution, stop: Option<ExecutionStatus>) -> WorkflowExecution {
        execution.status = stop.unwrap_or(ExecutionStatus::Succeeded);
        execution.finished_at = Some(self.clock.utc_now());
        self.publish_execution(&execution).await;
        self.cancels.lock().await.remove(&execution.execution_id);
        info!(execution = %execution.execution_id, status = ?execution.status, "workflow.finished");
        execution
    }

    async fn begin_step(&self, execution: &mut WorkflowExecution, step_id: &str) {
        let idx = step_index(step_id);
        let now = self.clock.utc_now();
        execution.steps[idx].status = StepStatus::Running;
        execution.steps[idx].started_at = Some(now);
        self.sync_step(execution, idx).await;
    }

    async fn finish_step(
        &self,
        execution: &mut WorkflowExecution,
        step_id: &str,
        status: StepStatus,
        detail: Option<String>,
        error: Option<WorkflowFailure>,
    ) {
        let idx = step_index(step_id);
        let now = self.clock.utc_now();
        execution.steps[idx].status = status;
        execution.steps[idx].finished_at = Some(now);
        execution.steps[idx].detail = detail;
        execution.steps[idx].error = error;
        self.sync_step(execution, idx).await;
    }

    async fn skip_step(&self, execution: &mut WorkflowExecution, step_id: &str, detail: &str) {
        let idx = step_index(step_id);
        let now = self.clock.utc_now();
        execution.steps[idx].status = StepStatus::Skipped;
        execution.steps[idx].started_at = Some(now);
        execution.steps[idx].finished_at = Some(now);
        execution.steps[idx].detail = Some(detail.to_string());
        self.sync_step(execution, idx).await;
    }

    async fn sync_step(&self, execution: &WorkflowExecution, idx: usize) {
        self.executions.lock().await.insert(execution.execution_id.clone(), execution.clone());
        let step = &execution.steps[idx];
        let at = step.finished_at.or(step.started_at).unwrap_or_else(|| self.clock.utc_now());
        let _ = self.events_tx.send(WorkflowEvent::Step {
            execution_id: execution.execution_id.clone(),
            step_id: step.id.clone(),
            status: step.status,
            at,
            detail: step.detail.clone(),
        });
    }

    async fn publish_execution(&self, execution: &WorkflowExecution) {
        self.executions.lock().await.insert(execution.execution_id.clone(), execution.clone());
        let at = execution.finished_at.unwrap_or(execution.started_at);
        let _ = self.events_tx.send(WorkflowEvent::Execution {
            execution_id: execution.execution_id.clone(),
            status: execution.status,
            at,
        });
    }

    fn orchestrator_descriptor(&self, request: &StartProjectRequest) -> AgentDescriptor {
        AgentDescriptor {
            id: "orchestrator".to_string(),
            session_name: self.orchestrator_session.clone(),
            role: Role::Orchestrator,
            system_prompt_path: crate::prompt::template_path(&self.prompt_dir, Role::Orchestrator),
            project_path: request.project_path.clone(),
            member_id: None,
        }
    }

    fn member_descriptor(&self, request: &StartProjectRequest, member: &TeamMemberSpec) -> AgentDescriptor {
        AgentDescriptor {
            id: member.id.clone(),
            session_name: member.session_name.clone(),
            role: member.role,
            system_prompt_path: crate::prompt::template_path(&self.prompt_dir, member.role),
            project_path: request.project_path.clone(),
            member_id: Some(member.id.clone()),
        }
    }

    /// Seed the team's roster rows in the JSON mirror before any member
    /// initialization starts, so a later `register-agent` callback for a
    /// member session has a matching row to update. A no-op when no state
    /// file is wired up.
    fn upsert_roster(&self, request: &StartProjectRequest) {
        let Some(state_file) = &self.state_file else { return };
        let team = TeamRecord {
            id: request.team_id.clone(),
            members: request
                .members
                .iter()
                .map(|m| MemberRecord {
                    id: m.id.clone(),
                    session_name: m.session_name.to_string(),
                    role: m.role.to_string(),
                    agent_status: AgentStatus::Activating,
                    working_status: WorkingStatus::Idle,
                    ready_at: None,
                })
                .collect(),
        };
        if let Err(e) = state_file.upsert_team(team) {
            warn!(team = %request.team_id, error = %e, "workflow.roster_mirror_write_failed");
        }
    }

    async fn run_check_orchestrator(
        &self,
        execution: &mut WorkflowExecution,
        orchestrator_already_live: &mut bool,
        stop: &mut Option<ExecutionStatus>,
    ) {
        self.begin_step(execution, STEP_CHECK_ORCHESTRATOR).await;
        match self.driver.session_exists(&self.orchestrator_session).await {
            Ok(exists) => {
                *orchestrator_already_live = exists;
                let detail = if exists { "orchestrator session already live" } else { "orchestrator session absent" };
                self.finish_step(execution, STEP_CHECK_ORCHESTRATOR, StepStatus::Succeeded, Some(detail.to_string()), None)
                    .await;
            }
            Err(e) => {
                let failure =
                    WorkflowFailure { step_id: STEP_CHECK_ORCHESTRATOR.to_string(), message: e.to_string(), code: e.code() };
                self.finish_step(execution, STEP_CHECK_ORCHESTRATOR, StepStatus::Failed, None, Some(failure)).await;
                *stop = Some(ExecutionStatus::Failed);
            }
        }
    }

    async fn run_create_orchestrator(
        &self,
        execution: &mut WorkflowExecution,
        request: &StartProjectRequest,
        orchestrator_already_live: bool,
        stop: &mut Option<ExecutionStatus>,
    ) {
        if orchestrator_already_live {
            self.skip_step(execution, STEP_CREATE_ORCHESTRATOR, "orchestrator session already live").await;
            return;
        }
        self.begin_step(execution, STEP_CREATE_ORCHESTRATOR).await;
        match self.driver.create_session(&self.orchestrator_session, &request.project_path, Some("orchestrator")).await
        {
            Ok(()) => {
                self.finish_step(execution, STEP_CREATE_ORCHESTRATOR, StepStatus::Succeeded, None, None).await;
            }
            Err(crate::driver::DriverError::AlreadyExists(_)) => {
                self.finish_step(
                    execution,
                    STEP_CREATE_ORCHESTRATOR,
                    StepStatus::Succeeded,
                    Some("orchestrator session was created concurrently".to_string()),
                    None,
                )
                .await;
            }
            Err(e) => {
                let failure =
                    WorkflowFailure { step_id: STEP_CREATE_ORCHESTRATOR.to_string(), message: e.to_string(), code: e.code() };
                self.finish_step(execution, STEP_CREATE_ORCHESTRATOR, StepStatus::Failed, None, Some(failure)).await;
                *stop = Some(ExecutionStatus::Failed);
            }
        }
    }

    async fn run_initialize_claude(
        &self,
        execution: &mut WorkflowExecution,
        request: &StartProjectRequest,
        stop: &mut Option<ExecutionStatus>,
    ) {
        self.begin_step(execution, STEP_INITIALIZE_CLAUDE).await;
        let descriptor = self.orchestrator_descriptor(request);
        // A fresh, never-fired token: once a step has started it always runs
        // to completion (bounded by its own deadline below). Execution-level
        // cancellation is only honored at the step boundary, between
        // `should_stop` checks in `start_project`.
        let step_cancel = CancellationToken::new();
        let outcome = tokio::time::timeout(
            self.orchestrator_init_deadline,
            self.initializer.initialize(&descriptor, request.preserve_orchestrator, &step_cancel),
        )
        .await;

        match outcome {
            Ok(Ok(())) => {
                self.finish_step(execution, STEP_INITIALIZE_CLAUDE, StepStatus::Succeeded, None, None).await;
            }
            Ok(Err(failure)) => {
                let detail = failure.reason.message().to_string();
                let workflow_failure = WorkflowFailure {
                    step_id: STEP_INITIALIZE_CLAUDE.to_string(),
                    message: detail.clone(),
                    code: failure.reason.code(),
                };
                self.finish_step(
                    execution,
                    STEP_INITIALIZE_CLAUDE,
                    StepStatus::Failed,
                    Some(detail),
                    Some(workflow_failure),
                )
                .await;
                *stop = Some(ExecutionStatus::Failed);
            }
            Err(_elapsed) => {
                let failure = WorkflowFailure {
                    step_id: STEP_INITIALIZE_CLAUDE.to_string(),
                    message: "Timed out waiting for CLI to reach interactive prompt".to_string(),
                    code: ErrorCode::Timeout,
                };
                self.finish_step(
                    execution,
                    STEP_INITIALIZE_CLAUDE,
                    StepStatus::Failed,
                    Some("step deadline exceeded".to_string()),
                    Some(failure),
                )
                .await;
                *stop = Some(ExecutionStatus::Failed);
            }
        }
    }

    async fn run_create_team_sessions(
        &self,
        execution: &mut WorkflowExecution,
        request: &StartProjectRequest,
        stop: &mut Option<ExecutionStatus>,
    ) {
        self.begin_step(execution, STEP_CREATE_TEAM_SESSIONS).await;
        self.upsert_roster(request);

        let tasks = request.members.iter().map(|member| {
            let descriptor = self.member_descriptor(request, member);
            let initializer = Arc::clone(&self.initializer);
            let deadline = self.member_init_deadline;
            async move {
                // See the comment in `run_initialize_claude`: once a member's
                // initialization has started it runs to completion.
                let step_cancel = CancellationToken::new();
                let outcome =
                    tokio::time::timeout(deadline, initializer.initialize(&descriptor, false, &step_cancel)).await;
                (descriptor.id, outcome)
            }
        });
        let results = futures_util::future::join_all(tasks).await;

        let mut failed_members = Vec::new();
        for (member_id, outcome) in results {
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(failure)) => failed_members.push(format!("{member_id}: {}", failure.reason.message())),
                Err(_elapsed) => failed_members.push(format!("{member_id}: step deadline exceeded")),
            }
        }

        if failed_members.is_empty() {
            self.finish_step(execution, STEP_CREATE_TEAM_SESSIONS, StepStatus::Succeeded, None, None).await;
        } else {
            let message = failed_members.join("; ");
            warn!(execution = %execution.execution_id, failures = %message, "workflow.team_partial_failure");
            let failure =
                WorkflowFailure { step_id: STEP_CREATE_TEAM_SESSIONS.to_string(), message: message.clone(), code: ErrorCode::Timeout };
            self.finish_step(execution, STEP_CREATE_TEAM_SESSIONS, StepStatus::Failed, Some(message), Some(failure))
                .await;
            *stop = Some(ExecutionStatus::Failed);
        }
    }

    async fn run_send_project_prompt(
        &self,
        execution: &mut WorkflowExecution,
        request: &StartProjectRequest,
        stop: &mut Option<ExecutionStatus>,
    ) {
        self.begin_step(execution, STEP_SEND_PROJECT_PROMPT).await;

        let prompt = ProjectStartPrompt {
            project_name: request.project_name.clone(),
            project_path: request.project_path.to_string_lossy().into_owned(),
            team_name: request.team_name.clone(),
            members: request
                .members
                .iter()
                .map(|m| RosterMember { name: m.id.clone(), role: m.role, skills: m.skills.clone() })
                .collect(),
            requirements: request.requirements.clone(),
        };
        let rendered = prompt.render();

        match self.driver.send_keys(&self.orchestrator_session, &[Key::Literal(rendered), Key::Enter]).await {
            Ok(()) => {
                self.finish_step(execution, STEP_SEND_PROJECT_PROMPT, StepStatus::Succeeded, None, None).await;
            }
            Err(e) => {
                let failure =
                    WorkflowFailure { step_id: STEP_SEND_PROJECT_PROMPT.to_string(), message: e.to_string(), code: e.code() };
                self.finish_step(execution, STEP_SEND_PROJECT_PROMPT, StepStatus::Failed, None, Some(failure)).await;
                *stop = Some(ExecutionStatus::Failed);
            }
        }
    }

    async fn run_monitor_setup(
        &self,
        execution: &mut WorkflowExecution,
        request: &StartProjectRequest,
        stop: &mut Option<ExecutionStatus>,
    ) {
        self.begin_step(execution, STEP_MONITOR_SETUP).await;

        let mut watched = vec![self.orchestrator_session.to_string()];
        watched.extend(request.members.iter().map(|m| m.session_name.to_string()));

        let deadline_at = tokio::time::Instant::now() + self.monitor_deadline;
        loop {
            if self.registry.all_active(&watched).await {
                self.finish_step(execution, STEP_MONITOR_SETUP, StepStatus::Succeeded, None, None).await;
                return;
            }
            if tokio::time::Instant::now() >= deadline_at {
                let failure = WorkflowFailure {
                    step_id: STEP_MONITOR_SETUP.to_string(),
                    message: "Timed out waiting for the team to register as active".to_string(),
                    code: ErrorCode::Timeout,
                };
                self.finish_step(
                    execution,
                    STEP_MONITOR_SETUP,
                    StepStatus::Failed,
                    Some("monitor deadline exceeded".to_string()),
                    Some(failure),
                )
                .await;
                *stop = Some(ExecutionStatus::Failed);
                return;
            }
            tokio::time::sleep(self.monitor_poll_interval).await;
        }
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
