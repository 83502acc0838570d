// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registration callback: the single operation the outside world uses to
//! tell the core an agent has finished booting.
//!
//! This is a plain async function over the Registration Registry's shared
//! state, not an HTTP handler — there is no HTTP/WebSocket layer in this
//! crate. The `register-agent` CLI subcommand and any future transport both
//! call this same function.

use tracing::warn;

use crate::registry::{AgentStatus, Registry};
use crate::session::Role;
use crate::state_file::StateFile;

/// One call to the registration callback.
#[derive(Debug, Clone)]
pub struct RegisterAgentRequest {
    pub session_name: String,
    pub role: Role,
    pub member_id: Option<String>,
    /// Raw status token from the caller. Only `"active"` (case-insensitive)
    /// has any effect; anything else is logged and ignored.
    pub status: String,
}

/// Apply one registration callback to `registry`, mirroring team-roster
/// status into `state_file` when one is wired up.
///
/// Orchestrator registration is already mirrored by
/// [`Registry::mark_active`] via session-name equality; the `state_file`
/// update here covers the team-member rows of the persisted document,
/// which the Registry has no reason to know about.
pub async fn register_agent(registry: &Registry, state_file: Option<&StateFile>, request: RegisterAgentRequest) {
    if !request.status.eq_ignore_ascii_case("active") {
        warn!(
            session = %request.session_name,
            status = %request.status,
            "registration.ignored_non_active_status"
        );
        return;
    }

    if let Err(conflict) = registry.mark_active(&request.session_name, request.role, request.member_id.clone()).await
    {
        warn!(session = %request.session_name, %conflict, "registration.mark_active_conflict");
    }

    if let Some(state_file) = state_file {
        let ready_at = registry.get(&request.session_name).await.and_then(|r| r.ready_at);
        if let Err(e) = state_file.update_member_status(&request.session_name, AgentStatus::Active, ready_at) {
            warn!(session = %request.session_name, error = %e, "registration.state_file_write_failed");
        }
    }
}

#[cfg(test)]
#[path = "registration_tests.rs"]
mod tests;
