// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core data model: session identity and agent descriptors.
//!
//! `SessionName` is the only thing the driver, detector, registry, and
//! workflow engine share by value — every component that didn't create a
//! session holds its name as a reference, never the session itself.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DriverError;

/// Maximum length of a session name, in bytes.
pub const MAX_SESSION_NAME_LEN: usize = 64;

/// A validated terminal-multiplexer session name: ASCII, no whitespace, no
/// control characters, at most 64 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionName(String);

impl SessionName {
    /// Validate and wrap a session name.
    ///
    /// Rejects control characters (including newline, tab), embedded
    /// whitespace, non-ASCII bytes, empty strings, and names over
    /// [`MAX_SESSION_NAME_LEN`] bytes — all before any child process is
    /// spawned.
    pub fn new(name: impl Into<String>) -> Result<Self, DriverError> {
        let name = name.into();
        if name.is_empty() {
            return Err(DriverError::BadName("session name must not be empty".to_string()));
        }
        if name.len() > MAX_SESSION_NAME_LEN {
            return Err(DriverError::BadName(format!(
                "session name exceeds {MAX_SESSION_NAME_LEN} bytes: {name}"
            )));
        }
        if !name.is_ascii() {
            return Err(DriverError::BadName(format!("session name must be ASCII: {name}")));
        }
        if name.chars().any(|c| c.is_whitespace() || c.is_control() || c == '\'') {
            return Err(DriverError::BadName(format!(
                "session name must not contain whitespace, control characters, or quotes: {name:?}"
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A known-valid session name used as a last-resort default when a
    /// configured name turns out to be invalid after all. Never fails.
    pub fn fallback() -> Self {
        Self("agentmux-orchestrator".to_string())
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Role an agent plays on the team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Orchestrator,
    Developer,
    Qa,
    Tpm,
    Designer,
    Other,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Orchestrator => "orchestrator",
            Self::Developer => "developer",
            Self::Qa => "qa",
            Self::Tpm => "tpm",
            Self::Designer => "designer",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "orchestrator" => Ok(Self::Orchestrator),
            "developer" => Ok(Self::Developer),
            "qa" => Ok(Self::Qa),
            "tpm" => Ok(Self::Tpm),
            "designer" => Ok(Self::Designer),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Immutable description of one agent's session, supplied by the caller
/// (usually the workflow engine) to the Agent Initializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub id: String,
    pub session_name: SessionName,
    pub role: Role,
    pub system_prompt_path: std::path::PathBuf,
    pub project_path: std::path::PathBuf,
    #[serde(default)]
    pub member_id: Option<String>,
}

/// One before/after pane capture taken by the slash-probe. Ephemeral —
/// never persisted, never compared across probes other than the one that
/// took it.
#[derive(Debug, Clone)]
pub struct PaneProbeSample {
    pub session_name: SessionName,
    pub taken_at: chrono::DateTime<chrono::Utc>,
    pub text: String,
    pub byte_len: usize,
}

impl PaneProbeSample {
    pub fn new(session_name: SessionName, taken_at: chrono::DateTime<chrono::Utc>, text: String) -> Self {
        let byte_len = text.len();
        Self { session_name, taken_at, text, byte_len }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
