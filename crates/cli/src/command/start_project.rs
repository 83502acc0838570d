// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `agentmux start-project` — run the six-step orchestrator/team startup
//! recipe to completion and exit `0` iff it reached `succeeded` within the
//! caller's deadline (default: wait forever).
//!
//! Project/team/ticket storage is out of scope for this crate (the
//! HTTP/WebSocket layer that normally owns that data is not part of the
//! core), so everything beyond the bare `--project`/`--team` identifiers —
//! names, paths, requirements text, and the member roster — is read from a
//! `--manifest` JSON file supplied by the caller.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::run::Application;
use crate::session::{Role, SessionName};
use crate::workflow::{ExecutionStatus, StartProjectRequest, TeamMemberSpec};

/// CLI arguments for `agentmux start-project`.
#[derive(Debug, clap::Args)]
pub struct StartProjectArgs {
    /// Project identifier.
    #[arg(long)]
    pub project: String,

    /// Team identifier.
    #[arg(long)]
    pub team: String,

    /// Path to a JSON manifest describing the project/team data this core
    /// does not itself store (name, path, requirements, member roster).
    #[arg(long)]
    pub manifest: PathBuf,

    /// Give up and treat the run as failed if it has not reached a terminal
    /// status within this many seconds. Omit to wait forever.
    #[arg(long)]
    pub deadline_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    project_name: String,
    project_path: PathBuf,
    team_name: String,
    requirements: String,
    /// Overrides `--preserve-orchestrator` / `AGENTMUX_PRESERVE_ORCHESTRATOR`
    /// for this one project when present.
    preserve_orchestrator: Option<bool>,
    members: Vec<ManifestMember>,
}

#[derive(Debug, Deserialize)]
struct ManifestMember {
    id: String,
    session_name: String,
    role: String,
    #[serde(default)]
    skills: Vec<String>,
}

fn load_manifest(path: &PathBuf) -> anyhow::Result<Manifest> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn build_request(
    args: &StartProjectArgs,
    manifest: Manifest,
    default_preserve_orchestrator: bool,
) -> anyhow::Result<StartProjectRequest> {
    let mut members = Vec::with_capacity(manifest.members.len());
    for member in manifest.members {
        let role: Role = member.role.parse().map_err(|e: String| anyhow::anyhow!(e))?;
        members.push(TeamMemberSpec {
            id: member.id,
            session_name: SessionName::new(member.session_name)?,
            role,
            skills: member.skills,
        });
    }

    Ok(StartProjectRequest {
        execution_id: format!("{}-{}", args.project, args.team),
        project_id: args.project.clone(),
        project_name: manifest.project_name,
        project_path: manifest.project_path,
        team_id: args.team.clone(),
        team_name: manifest.team_name,
        requirements: manifest.requirements,
        members,
        preserve_orchestrator: manifest.preserve_orchestrator.unwrap_or(default_preserve_orchestrator),
    })
}

/// Run the subcommand. Returns a process exit code.
pub async fn run(args: &StartProjectArgs, app: &Application) -> i32 {
    let manifest = match load_manifest(&args.manifest) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("error: failed to read manifest {}: {e}", args.manifest.display());
            return 2;
        }
    };

    let request = match build_request(args, manifest, app.config.preserve_orchestrator) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: invalid manifest: {e}");
            return 2;
        }
    };

    let execution_id = request.execution_id.clone();
    let engine = app.engine.clone();
    let mut handle = tokio::spawn(async move { engine.start_project(request).await });

    if let Some(secs) = args.deadline_secs {
        tokio::select! {
            result = &mut handle => {
                return finish(result);
            }
            _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                app.engine.cancel(&execution_id).await;
            }
        }
    }

    finish(handle.await)
}

fn finish(execution: Result<crate::workflow::WorkflowExecution, tokio::task::JoinError>) -> i32 {
    let execution = match execution {
        Ok(execution) => execution,
        Err(e) => {
            eprintln!("error: start-project task panicked: {e}");
            return 1;
        }
    };

    for step in &execution.steps {
        println!("{:<24} {:?}", step.id, step.status);
    }
    println!("execution {} finished as {:?}", execution.execution_id, execution.status);

    if execution.status == ExecutionStatus::Succeeded {
        0
    } else {
        1
    }
}

#[cfg(test)]
#[path = "start_project_tests.rs"]
mod tests;
