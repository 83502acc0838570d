// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted orchestrator/team JSON state file.
//!
//! Load/save read the whole document into memory, mutate, then write
//! atomically via a temp-file-plus-rename in the same directory.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::registry::AgentStatus;

/// The distinguished orchestrator slot, keyed by session-name equality
/// rather than role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSlot {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub status: AgentStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Whether a team member's agent is currently doing work, independent of
/// its `agentStatus`. Not written by anything in this crate today — an
/// outer work-assignment layer owns it — but the field round-trips so
/// this crate never clobbers it on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkingStatus {
    Idle,
    Working,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: String,
    #[serde(rename = "sessionName")]
    pub session_name: String,
    pub role: String,
    #[serde(rename = "agentStatus")]
    pub agent_status: AgentStatus,
    #[serde(rename = "workingStatus")]
    pub working_status: WorkingStatus,
    #[serde(rename = "readyAt", skip_serializing_if = "Option::is_none")]
    pub ready_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRecord {
    pub id: String,
    pub members: Vec<MemberRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDocument {
    pub orchestrator: OrchestratorSlot,
    pub teams: Vec<TeamRecord>,
}

impl StateDocument {
    fn new(orchestrator_session: &str, now: DateTime<Utc>) -> Self {
        Self {
            orchestrator: OrchestratorSlot {
                session_id: orchestrator_session.to_string(),
                status: AgentStatus::Inactive,
                created_at: now,
                updated_at: now,
            },
            teams: Vec::new(),
        }
    }
}

/// Load the persisted document, or a fresh one if the file doesn't exist
/// yet.
pub fn load(path: &Path, orchestrator_session: &str, now: DateTime<Utc>) -> anyhow::Result<StateDocument> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(serde_json::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Ok(StateDocument::new(orchestrator_session, now))
        }
        Err(e) => Err(e.into()),
    }
}

/// Write the document atomically: write to a temp file in the same
/// directory, then rename over the target path.
pub fn save(path: &Path, doc: &StateDocument) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(doc)?;
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Thread-safe handle wrapping the on-disk document, used by the
/// Registration Registry to mirror orchestrator transitions and by the
/// workflow engine to upsert team rosters as sessions come up.
pub struct StateFile {
    path: PathBuf,
    doc: Mutex<StateDocument>,
}

impl StateFile {
    pub fn open(path: PathBuf, orchestrator_session: &str, now: DateTime<Utc>) -> anyhow::Result<Self> {
        let doc = load(&path, orchestrator_session, now)?;
        Ok(Self { path, doc: Mutex::new(doc) })
    }

    pub fn snapshot(&self) -> StateDocument {
        self.doc.lock().clone()
    }

    pub fn set_orchestrator_status(&self, status: AgentStatus, now: DateTime<Utc>) -> anyhow::Result<()> {
        {
            let mut doc = self.doc.lock();
            doc.orchestrator.status = status;
            doc.orchestrator.updated_at = now;
        }
        self.flush()
    }

    /// Insert or update one team's roster, preserving existing
    /// `agentStatus`/`workingStatus`/`readyAt` for members already present
    /// (a roster re-seed, e.g. on an idempotent restart, must not regress a
    /// member that already registered as active).
    pub fn upsert_team(&self, mut team: TeamRecord) -> anyhow::Result<()> {
        {
            let mut doc = self.doc.lock();
            if let Some(existing) = doc.teams.iter_mut().find(|t| t.id == team.id) {
                for member in &mut team.members {
                    if let Some(prior) = existing.members.iter().find(|m| m.id == member.id) {
                        member.agent_status = prior.agent_status;
                        member.working_status = prior.working_status;
                        member.ready_at = prior.ready_at;
                    }
                }
                *existing = team;
            } else {
                doc.teams.push(team);
            }
        }
        self.flush()
    }

    /// Update one member's `agentStatus`/`readyAt` across every team that
    /// references `session_name`, leaving the roster shape untouched.
    pub fn update_member_status(
        &self,
        session_name: &str,
        status: AgentStatus,
        ready_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()> {
        {
            let mut doc = self.doc.lock();
            for team in &mut doc.teams {
                for member in &mut team.members {
                    if member.session_name == session_name {
                        member.agent_status = status;
                        if ready_at.is_some() {
                            member.ready_at = ready_at;
                        }
                    }
                }
            }
        }
        self.flush()
    }

    fn flush(&self) -> anyhow::Result<()> {
        let doc = self.doc.lock().clone();
        debug!(path = %self.path.display(), "state_file.flush");
        save(&self.path, &doc)
    }
}

#[cfg(test)]
#[path = "state_file_tests.rs"]
mod tests;
