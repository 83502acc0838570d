// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level application assembly — shared by `main` and the CLI
//! subcommands. Wires the Terminal Driver, CLI Readiness Detector,
//! Registration Registry, Agent Initializer, and Workflow Engine into one
//! `Application` handle.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::clock::{self, SharedClock};
use crate::config::{Config, LogFormat};
use crate::detector::Detector;
use crate::driver::{TerminalDriver, TmuxDriver};
use crate::initializer::AgentInitializer;
use crate::registry::Registry;
use crate::state_file::StateFile;
use crate::workflow::WorkflowEngine;

/// Initialize the global `tracing` subscriber from `config`. Safe to call
/// more than once per process (subsequent calls are no-ops) — the CLI
/// subcommands and the main entry point all call this before doing
/// anything else.
pub fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;

    // Priority: --log-level / AGENTMUX_LOG_LEVEL > RUST_LOG > default ("info").
    let filter = if std::env::var("AGENTMUX_LOG_LEVEL").is_err() && config.log_level == "info" {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    } else {
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let result = match config.log_format_enum().unwrap_or(LogFormat::Json) {
        LogFormat::Json => fmt::fmt().with_env_filter(filter).json().try_init(),
        LogFormat::Text => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

/// Every component the CLI subcommands need, wired up from one [`Config`].
pub struct Application {
    pub config: Config,
    pub clock: SharedClock,
    pub driver: Arc<dyn TerminalDriver>,
    pub detector: Arc<Detector>,
    pub registry: Arc<Registry>,
    pub initializer: Arc<AgentInitializer>,
    pub engine: Arc<WorkflowEngine>,
    pub state_file: Arc<StateFile>,
}

/// Assemble an [`Application`] from `config`. Opens (or creates) the
/// persisted state file and wires the Registry's orchestrator mirror to it.
pub fn build(config: Config) -> anyhow::Result<Application> {
    config.validate()?;

    let clock = clock::system();
    let state_file = Arc::new(StateFile::open(
        config.state_file.clone(),
        &config.orchestrator_session,
        clock.utc_now(),
    )?);

    let driver: Arc<dyn TerminalDriver> =
        Arc::new(TmuxDriver::new(config.mux_bin.clone(), config.shell.clone(), config.driver_timeout()));

    let detector = Arc::new(Detector::new(
        driver.clone(),
        clock.clone(),
        config.settle_delay(),
        config.growth_threshold,
        config.detector_cache_ttl(),
        i64::from(config.probe_lines),
    ));

    let registry = Arc::new(
        Registry::new(clock.clone())
            .with_orchestrator_mirror(config.orchestrator_session.clone(), state_file.clone()),
    );

    let initializer =
        Arc::new(AgentInitializer::from_config(driver.clone(), detector.clone(), registry.clone(), &config));

    let engine = WorkflowEngine::from_config_with_state_file(
        driver.clone(),
        initializer.clone(),
        registry.clone(),
        clock.clone(),
        &config,
        Some(state_file.clone()),
    );

    Ok(Application { config, clock, driver, detector, registry, initializer, engine, state_file })
}
