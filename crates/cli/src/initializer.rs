// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent Initializer (C3): brings one session from "shell or unknown" to
//! "AI CLI interactive and system-prompted" via a four-level escalation
//! ladder, each level more destructive than the last: a direct prompt, then
//! cleanup and relaunch, then a full session recreation, then abort.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::detector::Detector;
use crate::driver::{DriverError, Key, TerminalDriver};
use crate::error::{EscalationLevel, InitializerFailure, InitializerReason};
use crate::registry::Registry;
use crate::session::{AgentDescriptor, Role};

/// Escalation ladder level budgets, assembled from [`crate::config::Config`]
/// at construction time.
#[derive(Debug, Clone, Copy)]
pub struct LadderBudgets {
    pub l1: Duration,
    pub l2: Duration,
    pub l3: Duration,
    pub overall: Duration,
}

enum LevelOutcome {
    Success,
    Retry(InitializerReason),
}

/// Agent Initializer (C3).
pub struct AgentInitializer {
    driver: Arc<dyn TerminalDriver>,
    detector: Arc<Detector>,
    registry: Arc<Registry>,
    budgets: LadderBudgets,
    cli_launch_command_with_skip_permissions: String,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    poll_interval: Duration,
}

impl AgentInitializer {
    pub fn new(
        driver: Arc<dyn TerminalDriver>,
        detector: Arc<Detector>,
        registry: Arc<Registry>,
        budgets: LadderBudgets,
        cli_launch_command_with_skip_permissions: String,
    ) -> Self {
        Self {
            driver,
            detector,
            registry,
            budgets,
            cli_launch_command_with_skip_permissions,
            locks: Mutex::new(HashMap::new()),
            poll_interval: Duration::from_millis(200),
        }
    }

    /// Assemble the ladder budgets and launch command straight from a
    /// [`crate::config::Config`].
    pub fn from_config(
        driver: Arc<dyn TerminalDriver>,
        detector: Arc<Detector>,
        registry: Arc<Registry>,
        config: &crate::config::Config,
    ) -> Self {
        let budgets = LadderBudgets {
            l1: config.l1_budget(),
            l2: config.l2_budget(),
            l3: config.l3_budget(),
            overall: config.initializer_deadline(),
        };
        Self::new(driver, detector, registry, budgets, config.cli_launch_command_with_skip_permissions())
    }

    async fn try_acquire(&self, session: &str) -> Option<OwnedMutexGuard<()>> {
        let mutex = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(session.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))))
        };
        mutex.try_lock_owned().ok()
    }

    /// Run the escalation ladder for `descriptor`. `preserve_orchestrator`
    /// controls whether L3 is skipped for the orchestrator role.
    pub async fn initialize(
        &self,
        descriptor: &AgentDescriptor,
        preserve_orchestrator: bool,
        cancel: &CancellationToken,
    ) -> Result<(), InitializerFailure> {
        let session_key = descriptor.session_name.to_string();
        let _guard = self.try_acquire(&session_key).await.ok_or(InitializerFailure {
            level_reached: EscalationLevel::L1,
            reason: InitializerReason::Busy,
        })?;

        let overall_deadline_at = tokio::time::Instant::now() + self.budgets.overall;
        self.registry.mark_activating(&session_key, descriptor.role).await;

        let mut last_reason = InitializerReason::TimedOut;

        match self.run_level1(descriptor, overall_deadline_at, cancel).await {
            LevelOutcome::Success => return Ok(()),
            LevelOutcome::Retry(reason) => {
                if reason == InitializerReason::Cancelled {
                    self.restore_idle(descriptor).await;
                    return Err(InitializerFailure { level_reached: EscalationLevel::L1, reason });
                }
                last_reason = reason;
            }
        }

        match self.run_level2(descriptor, overall_deadline_at, cancel).await {
            LevelOutcome::Success => return Ok(()),
            LevelOutcome::Retry(reason) => {
                if reason == InitializerReason::Cancelled {
                    self.restore_idle(descriptor).await;
                    return Err(InitializerFailure { level_reached: EscalationLevel::L2, reason });
                }
                last_reason = reason;
            }
        }

        let skip_l3 = preserve_orchestrator && descriptor.role == Role::Orchestrator;
        if !skip_l3 {
            match self.run_level3(descriptor, overall_deadline_at, cancel).await {
                LevelOutcome::Success => return Ok(()),
                LevelOutcome::Retry(reason) => {
                    if reason == InitializerReason::Cancelled {
                        self.restore_idle(descriptor).await;
                        return Err(InitializerFailure { level_reached: EscalationLevel::L3, reason });
                    }
                    last_reason = reason;
                }
            }
        }

        warn!(session = %descriptor.session_name, ?last_reason, skipped_l3 = skip_l3, "initializer.aborted");
        Err(InitializerFailure { level_reached: EscalationLevel::L4, reason: last_reason })
    }

    /// L1: probe, and if already interactive, send the prompt directly.
    /// Idempotent — no destructive action taken.
    async fn run_level1(
        &self,
        descriptor: &AgentDescriptor,
        overall_deadline_at: tokio::time::Instant,
        cancel: &CancellationToken,
    ) -> LevelOutcome {
        if cancel.is_cancelled() {
            return LevelOutcome::Retry(InitializerReason::Cancelled);
        }
        let level_deadline_at =
            std::cmp::min(tokio::time::Instant::now() + self.budgets.l1, overall_deadline_at);

        if !self.detector.is_cli_interactive(&descriptor.session_name).await {
            return LevelOutcome::Retry(InitializerReason::TimedOut);
        }

        if let Err(reason) = self.send_prompt(descriptor).await {
            return LevelOutcome::Retry(reason);
        }

        self.finish_with_wait(descriptor, level_deadline_at, cancel).await
    }

    /// L2: interrupt whatever is running, relaunch the CLI with the
    /// skip-dangerous-permissions flag, then send the prompt.
    async fn run_level2(
        &self,
        descriptor: &AgentDescriptor,
        overall_deadline_at: tokio::time::Instant,
        cancel: &CancellationToken,
    ) -> LevelOutcome {
        if cancel.is_cancelled() {
            return LevelOutcome::Retry(InitializerReason::Cancelled);
        }
        let level_deadline_at =
            std::cmp::min(tokio::time::Instant::now() + self.budgets.l2, overall_deadline_at);

        if let Err(e) =
            self.driver.send_keys(&descriptor.session_name, &[Key::CtrlC, Key::CtrlC, Key::Enter]).await
        {
            return LevelOutcome::Retry(self.classify_driver_error(e));
        }
        self.detector.invalidate(&descriptor.session_name).await;

        if !sleep_respecting_cancel(Duration::from_secs(1), cancel).await {
            return LevelOutcome::Retry(InitializerReason::Cancelled);
        }

        if let Err(reason) = self.launch_cli(descriptor).await {
            return LevelOutcome::Retry(reason);
        }

        if !self.poll_until_interactive(descriptor, level_deadline_at, cancel).await {
            if cancel.is_cancelled() {
                return LevelOutcome::Retry(InitializerReason::Cancelled);
            }
            return LevelOutcome::Retry(InitializerReason::TimedOut);
        }

        if let Err(reason) = self.send_prompt(descriptor).await {
            return LevelOutcome::Retry(reason);
        }

        self.finish_with_wait(descriptor, level_deadline_at, cancel).await
    }

    /// L3: kill and recreate the session from scratch, relaunch, then send
    /// the prompt. Loses any in-session scrollback.
    async fn run_level3(
        &self,
        descriptor: &AgentDescriptor,
        overall_deadline_at: tokio::time::Instant,
        cancel: &CancellationToken,
    ) -> LevelOutcome {
        if cancel.is_cancelled() {
            return LevelOutcome::Retry(InitializerReason::Cancelled);
        }
        let level_deadline_at =
            std::cmp::min(tokio::time::Instant::now() + self.budgets.l3, overall_deadline_at);

        // Mirror the orchestrator slot to `inactive` before the kill so a
        // reader of the JSON file never sees a stale `active` orchestrator
        // while its session is being torn down and recreated.
        self.registry.mark_killed(descriptor.session_name.as_str()).await;

        match self.driver.kill_session(&descriptor.session_name).await {
            Ok(()) | Err(DriverError::NotFound(_)) => {}
            Err(e) => return LevelOutcome::Retry(self.classify_driver_error(e)),
        }
        self.detector.invalidate(&descriptor.session_name).await;

        if let Err(e) =
            self.driver.create_session(&descriptor.session_name, &descriptor.project_path, None).await
        {
            return LevelOutcome::Retry(self.classify_driver_error(e));
        }

        if let Err(reason) = self.launch_cli(descriptor).await {
            return LevelOutcome::Retry(reason);
        }

        if !self.poll_until_interactive(descriptor, level_deadline_at, cancel).await {
            if cancel.is_cancelled() {
                return LevelOutcome::Retry(InitializerReason::Cancelled);
            }
            return LevelOutcome::Retry(InitializerReason::TimedOut);
        }

        if let Err(reason) = self.send_prompt(descriptor).await {
            return LevelOutcome::Retry(reason);
        }

        self.finish_with_wait(descriptor, level_deadline_at, cancel).await
    }

    async fn launch_cli(&self, descriptor: &AgentDescriptor) -> Result<(), InitializerReason> {
        let command = self.cli_launch_command_with_skip_permissions.clone();
        self.driver
            .send_keys(&descriptor.session_name, &[Key::Literal(command), Key::Enter])
            .await
            .map_err(|e| self.classify_driver_error(e))?;
        self.detector.invalidate(&descriptor.session_name).await;
        Ok(())
    }

    /// Load the role's template, substitute placeholders, and deliver it
    /// to the pane as one payload followed by `Enter`.
    async fn send_prompt(&self, descriptor: &AgentDescriptor) -> Result<(), InitializerReason> {
        let member_id = descriptor.member_id.clone().unwrap_or_default();
        let rendered = crate::prompt::render_system_prompt(
            &descriptor.system_prompt_path,
            descriptor.session_name.as_str(),
            Some(member_id.as_str()),
        )
        .map_err(|e| {
            warn!(session = %descriptor.session_name, error = %e, "initializer.prompt_load_failed");
            InitializerReason::DriverError
        })?;

        self.driver
            .send_keys(&descriptor.session_name, &[Key::Literal(rendered), Key::Enter])
            .await
            .map_err(|e| self.classify_driver_error(e))?;
        self.detector.invalidate(&descriptor.session_name).await;
        Ok(())
    }

    async fn finish_with_wait(
        &self,
        descriptor: &AgentDescriptor,
        level_deadline_at: tokio::time::Instant,
        cancel: &CancellationToken,
    ) -> LevelOutcome {
        match self.registry.wait_active(descriptor.session_name.as_str(), level_deadline_at, cancel).await {
            Ok(()) => {
                info!(session = %descriptor.session_name, "initializer.active");
                LevelOutcome::Success
            }
            Err(crate::error::WaitError::TimedOut) => LevelOutcome::Retry(InitializerReason::TimedOut),
            Err(crate::error::WaitError::Cancelled) => LevelOutcome::Retry(InitializerReason::Cancelled),
        }
    }

    async fn poll_until_interactive(
        &self,
        descriptor: &AgentDescriptor,
        deadline_at: tokio::time::Instant,
        cancel: &CancellationToken,
    ) -> bool {
        loop {
            if self.detector.is_cli_interactive(&descriptor.session_name).await {
                return true;
            }
            if cancel.is_cancelled() || tokio::time::Instant::now() >= deadline_at {
                return false;
            }
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = tokio::time::sleep_until(deadline_at) => return false,
            }
        }
    }

    fn classify_driver_error(&self, error: DriverError) -> InitializerReason {
        match error {
            DriverError::Timeout => InitializerReason::TimedOut,
            _ => InitializerReason::DriverError,
        }
    }

    /// Send a final `Escape` so the pane is left idle, even on a failure
    /// path — cancellation must never leave the pane mid-palette.
    async fn restore_idle(&self, descriptor: &AgentDescriptor) {
        let _ = self.driver.send_keys(&descriptor.session_name, &[Key::Escape]).await;
    }
}

/// Sleep for `duration`, returning `false` early if `cancel` fires first.
async fn sleep_respecting_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.cancelled() => false,
    }
}

#[cfg(test)]
#[path = "initializer_tests.rs"]
mod tests;
