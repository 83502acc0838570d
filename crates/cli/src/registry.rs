// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registration Registry (C4): the single source of truth for "has this
//! agent finished booting?".
//!
//! All mutations are serialized under one `tokio::sync::Mutex`. Waiters on
//! a session are released in FIFO order of arrival via a `Vec` of oneshot
//! senders drained front-to-back.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

use crate::clock::SharedClock;
use crate::error::{RegistryError, WaitError};
use crate::session::Role;
use crate::state_file::StateFile;

/// Activation status of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Inactive,
    Activating,
    Active,
}

/// Per-session activation record. Status transitions only move forward
/// through `Inactive -> Activating -> Active`; once `Active`, `ready_at`
/// is fixed until the record is removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub session_name: String,
    pub role: Role,
    pub status: AgentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ready_at: Option<DateTime<Utc>>,
    pub member_id: Option<String>,
}

struct Waiter {
    tx: oneshot::Sender<Result<(), WaitError>>,
}

#[derive(Default)]
struct Inner {
    records: HashMap<String, RegistrationRecord>,
    waiters: HashMap<String, Vec<Waiter>>,
}

/// Process-wide store of session activation state (C4). Created once by the
/// application entry point and shared as `Arc<Registry>` — the one component
/// in this crate that legitimately needs process-wide identity.
pub struct Registry {
    inner: Mutex<Inner>,
    clock: SharedClock,
    /// Session name distinguishing the one mirrored "orchestrator" slot —
    /// matched by equality, never by role.
    orchestrator_session: Option<String>,
    mirror: Option<Arc<StateFile>>,
}

impl Registry {
    pub fn new(clock: SharedClock) -> Self {
        Self { inner: Mutex::new(Inner::default()), clock, orchestrator_session: None, mirror: None }
    }

    pub fn shared(clock: SharedClock) -> Arc<Self> {
        Arc::new(Self::new(clock))
    }

    /// Wire the well-known orchestrator session name and its JSON mirror.
    /// Transitions of that one session are additionally persisted.
    pub fn with_orchestrator_mirror(mut self, orchestrator_session: String, mirror: Arc<StateFile>) -> Self {
        self.orchestrator_session = Some(orchestrator_session);
        self.mirror = Some(mirror);
        self
    }

    fn is_orchestrator(&self, session_name: &str) -> bool {
        self.orchestrator_session.as_deref() == Some(session_name)
    }

    /// Create or update the record to `Activating`; never changes
    /// `ready_at`.
    pub async fn mark_activating(&self, session_name: &str, role: Role) {
        let now = self.clock.utc_now();
        let mut inner = self.inner.lock().await;
        match inner.records.get_mut(session_name) {
            Some(record) if record.status != AgentStatus::Active => {
                record.status = AgentStatus::Activating;
                record.role = role;
                record.updated_at = now;
            }
            Some(_) => {
                // Already active: status only ever moves forward, so this
                // never steps back to Activating.
            }
            None => {
                inner.records.insert(
                    session_name.to_string(),
                    RegistrationRecord {
                        session_name: session_name.to_string(),
                        role,
                        status: AgentStatus::Activating,
                        created_at: now,
                        updated_at: now,
                        ready_at: None,
                        member_id: None,
                    },
                );
            }
        }
        debug!(session = session_name, "registry.mark_activating");

        if self.is_orchestrator(session_name) {
            if let Some(mirror) = &self.mirror {
                if let Err(e) = mirror.set_orchestrator_status(AgentStatus::Activating, now) {
                    warn!(session = session_name, error = %e, "registry.mirror_write_failed");
                }
            }
        }
    }

    /// Set status to `Active`, fix `ready_at`, and release every waiter on
    /// this session in FIFO order. Calling this on a record that is already
    /// `Active` under a *different* role is a [`RegistryError::Conflict`]:
    /// logged and treated as a no-op.
    pub async fn mark_active(
        &self,
        session_name: &str,
        role: Role,
        member_id: Option<String>,
    ) -> Result<(), RegistryError> {
        let now = self.clock.utc_now();
        let mut inner = self.inner.lock().await;

        if let Some(existing) = inner.records.get(session_name) {
            if existing.status == AgentStatus::Active && existing.role != role {
                let conflict = RegistryError::Conflict {
                    session_name: session_name.to_string(),
                    existing_role: existing.role.to_string(),
                    requested_role: role.to_string(),
                };
                warn!(session = session_name, %conflict, "registry.mark_active_conflict");
                return Err(conflict);
            }
        }

        let ready_at = inner
            .records
            .get(session_name)
            .and_then(|r| r.ready_at)
            .unwrap_or(now);

        inner.records.insert(
            session_name.to_string(),
            RegistrationRecord {
                session_name: session_name.to_string(),
                role,
                status: AgentStatus::Active,
                created_at: inner.records.get(session_name).map(|r| r.created_at).unwrap_or(now),
                updated_at: now,
                ready_at: Some(ready_at),
                member_id,
            },
        );
        debug!(session = session_name, "registry.mark_active");

        if let Some(waiters) = inner.waiters.remove(session_name) {
            for waiter in waiters {
                let _ = waiter.tx.send(Ok(()));
            }
        }
        drop(inner);

        if self.is_orchestrator(session_name) {
            if let Some(mirror) = &self.mirror {
                if let Err(e) = mirror.set_orchestrator_status(AgentStatus::Active, now) {
                    warn!(session = session_name, error = %e, "registry.mirror_write_failed");
                }
            }
        }
        Ok(())
    }

    pub async fn get(&self, session_name: &str) -> Option<RegistrationRecord> {
        self.inner.lock().await.records.get(session_name).cloned()
    }

    /// Remove the record for a killed session, dropping any waiters (they
    /// will observe a channel close, surfaced as `Cancelled`).
    pub async fn remove(&self, session_name: &str) {
        let mut inner = self.inner.lock().await;
        inner.records.remove(session_name);
        inner.waiters.remove(session_name);
        debug!(session = session_name, "registry.remove");
    }

    /// Called by the Agent Initializer immediately before it kills a
    /// session during L3 recreation. Drops the in-memory record and, if
    /// the killed session is the distinguished orchestrator slot,
    /// transitions the JSON mirror to `Inactive` *before* the recreate
    /// call is issued.
    pub async fn mark_killed(&self, session_name: &str) {
        self.remove(session_name).await;
        if self.is_orchestrator(session_name) {
            if let Some(mirror) = &self.mirror {
                let now = self.clock.utc_now();
                if let Err(e) = mirror.set_orchestrator_status(AgentStatus::Inactive, now) {
                    warn!(session = session_name, error = %e, "registry.mirror_write_failed");
                }
            }
        }
    }

    /// Suspend until the record for `session_name` becomes `Active`, the
    /// deadline passes, or the cancellation token fires.
    pub async fn wait_active(
        &self,
        session_name: &str,
        deadline: tokio::time::Instant,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> Result<(), WaitError> {
        {
            let inner = self.inner.lock().await;
            if let Some(record) = inner.records.get(session_name) {
                if record.status == AgentStatus::Active {
                    return Ok(());
                }
            }
        }

        let (tx, rx) = oneshot::channel();
        {
            let mut inner = self.inner.lock().await;
            // Re-check under lock in case `mark_active` raced us between
            // the first check and registering as a waiter.
            if let Some(record) = inner.records.get(session_name) {
                if record.status == AgentStatus::Active {
                    return Ok(());
                }
            }
            inner.waiters.entry(session_name.to_string()).or_default().push(Waiter { tx });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(WaitError::Cancelled),
            result = rx => result.unwrap_or(Err(WaitError::Cancelled)),
            _ = tokio::time::sleep_until(deadline) => Err(WaitError::TimedOut),
        }
    }

    /// Number of sessions currently holding an in-memory record. Used by the
    /// `monitor_setup` workflow step to decide when a whole team is ready.
    pub async fn all_active(&self, session_names: &[String]) -> bool {
        let inner = self.inner.lock().await;
        session_names.iter().all(|name| {
            inner.records.get(name).map(|r| r.status == AgentStatus::Active).unwrap_or(false)
        })
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
