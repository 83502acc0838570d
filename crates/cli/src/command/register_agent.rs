// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `agentmux register-agent` — drive the registration callback from a shell
//! context: an AI CLI, once it has read its system prompt, shells out to
//! this subcommand to announce itself ready.
//!
//! A one-shot process has no way to reach another process's in-memory
//! Registry without a transport (out of scope for this crate), so this
//! subcommand opens its own `Registry` wired to the same persisted state
//! file the long-running orchestrator process mirrors into. The in-memory
//! record it creates is therefore process-local, but the on-disk effect —
//! the orchestrator slot or team-member row flipping to `active` — is the
//! part other processes can observe.

use crate::registration::{register_agent, RegisterAgentRequest};
use crate::run::Application;
use crate::session::Role;

/// CLI arguments for `agentmux register-agent`.
#[derive(Debug, clap::Args)]
pub struct RegisterAgentArgs {
    /// Session name of the agent registering itself.
    #[arg(long)]
    pub session: String,

    /// Role the agent is registering as.
    #[arg(long)]
    pub role: String,

    /// Team-member identifier, if this is not the orchestrator.
    #[arg(long)]
    pub member: Option<String>,

    /// Status token. Only `active` has any effect.
    #[arg(long)]
    pub status: String,
}

/// Run the subcommand. Returns a process exit code.
pub async fn run(args: &RegisterAgentArgs, app: &Application) -> i32 {
    let role: Role = match args.role.parse() {
        Ok(role) => role,
        Err(e) => {
            eprintln!("error: {e}");
            return 2;
        }
    };

    let request = RegisterAgentRequest {
        session_name: args.session.clone(),
        role,
        member_id: args.member.clone(),
        status: args.status.clone(),
    };

    register_agent(&app.registry, Some(&app.state_file), request).await;
    println!("registered {} as {} ({})", args.session, role, args.status);
    0
}

#[cfg(test)]
#[path = "register_agent_tests.rs"]
mod tests;
