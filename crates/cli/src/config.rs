// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Agent Session Orchestrator for AgentMux.
///
/// Every tunable is exposed as a flag with an `AGENTMUX_*`
/// environment-variable fallback.
#[derive(Debug, Clone, Parser)]
#[command(name = "agentmux", version, about)]
pub struct Config {
    /// Path to the persisted orchestrator/team JSON state file.
    #[arg(long, env = "AGENTMUX_STATE_FILE", default_value = "agentmux-state.json")]
    pub state_file: PathBuf,

    /// Directory holding per-role system prompt templates.
    #[arg(long, env = "AGENTMUX_PROMPT_DIR", default_value = "prompts")]
    pub prompt_dir: PathBuf,

    /// Fixed session name for the distinguished orchestrator agent.
    #[arg(long, env = "AGENTMUX_ORCHESTRATOR_SESSION", default_value = "agentmux-orchestrator")]
    pub orchestrator_session: String,

    /// Terminal-multiplexer binary to shell out to (e.g. `tmux`).
    #[arg(long, env = "AGENTMUX_MUX_BIN", default_value = "tmux")]
    pub mux_bin: String,

    /// Command used to launch the interactive AI CLI inside a freshly
    /// created or cleaned-up session. The Agent Initializer's L2/L3 levels
    /// append a "skip dangerous permissions" flag of the caller's choosing
    /// via [`Config::cli_launch_command_with_skip_permissions`].
    #[arg(long, env = "AGENTMUX_CLI_LAUNCH_COMMAND", default_value = "ai-cli")]
    pub cli_launch_command: String,

    /// Flag appended to `cli_launch_command` on L2/L3 escalation to skip
    /// interactive permission dialogs that would otherwise block the
    /// launch command itself from reaching an interactive prompt.
    #[arg(long, env = "AGENTMUX_CLI_SKIP_PERMISSIONS_FLAG", default_value = "--skip-dangerous-permissions")]
    pub cli_skip_permissions_flag: String,

    /// When set, the orchestrator session is never torn down by L3 — the
    /// escalation ladder goes directly to L4 instead of recreating it.
    #[arg(long, env = "AGENTMUX_PRESERVE_ORCHESTRATOR", default_value_t = false)]
    pub preserve_orchestrator: bool,

    /// Shell used to build the single `-c <command>` invocation.
    #[arg(long, env = "AGENTMUX_SHELL", default_value = "/bin/sh")]
    pub shell: String,

    /// Wall-clock timeout for a single terminal-driver invocation, in
    /// milliseconds.
    #[arg(long, env = "AGENTMUX_DRIVER_TIMEOUT_MS", default_value = "5000")]
    pub driver_timeout_ms: u64,

    /// Slash-probe settle delay, in milliseconds.
    #[arg(long, env = "AGENTMUX_SETTLE_DELAY_MS", default_value = "400")]
    pub settle_delay_ms: u64,

    /// Minimum byte growth between before/after pane captures for the
    /// slash-probe to consider the CLI interactive.
    #[arg(long, env = "AGENTMUX_GROWTH_THRESHOLD", default_value = "3")]
    pub growth_threshold: usize,

    /// Detector result cache TTL, in milliseconds.
    #[arg(long, env = "AGENTMUX_DETECTOR_CACHE_TTL_MS", default_value = "2000")]
    pub detector_cache_ttl_ms: u64,

    /// Number of trailing pane lines captured by the slash-probe.
    #[arg(long, env = "AGENTMUX_PROBE_LINES", default_value = "50")]
    pub probe_lines: u32,

    /// L1 (direct prompt) budget, in seconds.
    #[arg(long, env = "AGENTMUX_L1_BUDGET_SECS", default_value = "10")]
    pub l1_budget_secs: u64,

    /// L2 (cleanup & re-init) budget, in seconds.
    #[arg(long, env = "AGENTMUX_L2_BUDGET_SECS", default_value = "20")]
    pub l2_budget_secs: u64,

    /// L3 (full session recreation) budget, in seconds.
    #[arg(long, env = "AGENTMUX_L3_BUDGET_SECS", default_value = "30")]
    pub l3_budget_secs: u64,

    /// Overall escalation-ladder deadline shared across all levels, in
    /// seconds.
    #[arg(long, env = "AGENTMUX_INITIALIZER_DEADLINE_SECS", default_value = "90")]
    pub initializer_deadline_secs: u64,

    /// Deadline for the `initialize_claude` workflow step, in seconds.
    #[arg(long, env = "AGENTMUX_ORCHESTRATOR_INIT_DEADLINE_SECS", default_value = "45")]
    pub orchestrator_init_deadline_secs: u64,

    /// Per-member deadline for the `create_team_sessions` workflow step, in
    /// seconds.
    #[arg(long, env = "AGENTMUX_MEMBER_INIT_DEADLINE_SECS", default_value = "60")]
    pub member_init_deadline_secs: u64,

    /// Poll interval used by the `monitor_setup` workflow step, in
    /// milliseconds.
    #[arg(long, env = "AGENTMUX_MONITOR_POLL_MS", default_value = "2000")]
    pub monitor_poll_ms: u64,

    /// Overall deadline for the `monitor_setup` workflow step, in seconds.
    #[arg(long, env = "AGENTMUX_MONITOR_DEADLINE_SECS", default_value = "120")]
    pub monitor_deadline_secs: u64,

    /// Log format: `json` or `text`.
    #[arg(long, env = "AGENTMUX_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "AGENTMUX_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.log_format_enum()?;

        if self.growth_threshold == 0 {
            anyhow::bail!("--growth-threshold must be greater than zero");
        }
        if self.probe_lines == 0 {
            anyhow::bail!("--probe-lines must be greater than zero");
        }
        crate::session::SessionName::new(self.orchestrator_session.clone())
            .map_err(|err| anyhow::anyhow!("--orchestrator-session is invalid: {err}"))?;

        Ok(())
    }

    pub fn log_format_enum(&self) -> anyhow::Result<LogFormat> {
        match self.log_format.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" => Ok(LogFormat::Text),
            other => anyhow::bail!("invalid log format: {other}"),
        }
    }

    pub fn driver_timeout(&self) -> Duration {
        Duration::from_millis(self.driver_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn detector_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.detector_cache_ttl_ms)
    }

    pub fn l1_budget(&self) -> Duration {
        Duration::from_secs(self.l1_budget_secs)
    }

    pub fn l2_budget(&self) -> Duration {
        Duration::from_secs(self.l2_budget_secs)
    }

    pub fn l3_budget(&self) -> Duration {
        Duration::from_secs(self.l3_budget_secs)
    }

    pub fn initializer_deadline(&self) -> Duration {
        Duration::from_secs(self.initializer_deadline_secs)
    }

    pub fn orchestrator_init_deadline(&self) -> Duration {
        Duration::from_secs(self.orchestrator_init_deadline_secs)
    }

    pub fn member_init_deadline(&self) -> Duration {
        Duration::from_secs(self.member_init_deadline_secs)
    }

    pub fn monitor_poll_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_poll_ms)
    }

    pub fn monitor_deadline(&self) -> Duration {
        Duration::from_secs(self.monitor_deadline_secs)
    }

    /// The L2/L3 launch command with the skip-dangerous-permissions flag
    /// appended.
    pub fn cli_launch_command_with_skip_permissions(&self) -> String {
        format!("{} {}", self.cli_launch_command, self.cli_skip_permissions_flag)
    }
}

/// Selectable log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
