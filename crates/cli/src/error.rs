// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable, uppercase error codes shared across every externally observable
/// failure (workflow step `error` field, registration callback responses,
/// log lines). There is no HTTP or gRPC surface in this crate, so unlike the
/// upstream `ErrorCode` this carries no status-code mapping — just a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    Timeout,
    NotFound,
    AlreadyExists,
    SpawnFailed,
    BadName,
    Busy,
    Cancelled,
    Conflict,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "TIMEOUT",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::SpawnFailed => "SPAWN_FAILED",
            Self::BadName => "BAD_NAME",
            Self::Busy => "BUSY",
            Self::Cancelled => "CANCELLED",
            Self::Conflict => "CONFLICT",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the Terminal Driver (C1). Never retried inside the
/// driver itself — callers decide whether and how to retry.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverError {
    #[error("timed out waiting for the terminal tool")]
    Timeout,
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("session already exists: {0}")]
    AlreadyExists(String),
    #[error("failed to spawn terminal tool: {0}")]
    SpawnFailed(String),
    #[error("invalid session name: {0}")]
    BadName(String),
}

impl DriverError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout => ErrorCode::Timeout,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::AlreadyExists(_) => ErrorCode::AlreadyExists,
            Self::SpawnFailed(_) => ErrorCode::SpawnFailed,
            Self::BadName(_) => ErrorCode::BadName,
        }
    }
}

/// Reason the Agent Initializer (C3) gave up after the escalation ladder ran
/// out of levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitializerReason {
    TimedOut,
    Busy,
    Cancelled,
    DriverError,
}

impl InitializerReason {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::TimedOut => ErrorCode::Timeout,
            Self::Busy => ErrorCode::Busy,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::DriverError => ErrorCode::Internal,
        }
    }

    /// Short human message for the workflow step's `detail` field.
    pub fn message(&self) -> &'static str {
        match self {
            Self::TimedOut => "Timed out waiting for CLI to reach interactive prompt",
            Self::Busy => "Another initialization is already in progress for this session",
            Self::Cancelled => "Initialization was cancelled",
            Self::DriverError => "Terminal driver call failed during initialization",
        }
    }
}

/// Escalation level reached when an initialization attempt terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscalationLevel {
    L1,
    L2,
    L3,
    L4,
}

/// Terminal failure of [`crate::initializer::AgentInitializer::initialize`].
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("initialization failed at {level_reached:?}: {reason:?}")]
pub struct InitializerFailure {
    pub level_reached: EscalationLevel,
    pub reason: InitializerReason,
}

/// Error raised by Registration Registry (C4) mutations.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryError {
    /// `mark_active` was called for a session already active under a
    /// different role. Logged and swallowed by the caller — never
    /// propagated as a hard failure.
    #[error("session {session_name} is already active with role {existing_role}, got {requested_role}")]
    Conflict { session_name: String, existing_role: String, requested_role: String },
}

/// Outcome of [`crate::registry::Registry::wait_active`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitError {
    TimedOut,
    Cancelled,
}

/// The step whose failure caused a [`crate::workflow::WorkflowExecution`] to
/// abort, propagated verbatim to the event bus and stored on the execution.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("workflow step {step_id} failed: {message}")]
pub struct WorkflowFailure {
    pub step_id: String,
    pub message: String,
    pub code: ErrorCode,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
