// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use agentmux::command::register_agent::RegisterAgentArgs;
use agentmux::command::start_project::StartProjectArgs;
use agentmux::config::Config;

#[derive(Parser)]
#[command(name = "agentmux", version, about = "Agent session orchestrator for AI coding agents.")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    subcommand: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Stand up an orchestrator session and its team for one project.
    StartProject(StartProjectArgs),
    /// Drive the registration callback from a shell context.
    RegisterAgent(RegisterAgentArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    agentmux::run::init_tracing(&cli.config);

    if let Err(e) = cli.config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    let app = match agentmux::run::build(cli.config) {
        Ok(app) => app,
        Err(e) => {
            error!("fatal: {e:#}");
            std::process::exit(1);
        }
    };

    let code = match cli.subcommand {
        Some(Commands::StartProject(args)) => agentmux::command::start_project::run(&args, &app).await,
        Some(Commands::RegisterAgent(args)) => agentmux::command::register_agent::run(&args, &app).await,
        None => {
            eprintln!("error: a subcommand is required (start-project, register-agent)");
            2
        }
    };

    std::process::exit(code);
}
