// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI Readiness Detector (C2): the slash-probe protocol.
//!
//! Answers `is_cli_interactive(session)` without scraping the CLI's own
//! output: it sends `/`, checks whether the pane grew by more than a
//! threshold while preserving its prior content as a prefix (a command
//! palette opening), then always sends `Escape` to leave the pane idle.
//!
//! Results are memoized per session for a configurable TTL in a
//! `tokio::sync::RwLock<HashMap<..>>`, one lock per concern rather than
//! one shared `Mutex` guarding everything.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::clock::SharedClock;
use crate::driver::{Key, TerminalDriver};
use crate::session::{PaneProbeSample, SessionName};

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    value: bool,
    taken_at: std::time::Instant,
}

/// CLI Readiness Detector (C2).
pub struct Detector {
    driver: Arc<dyn TerminalDriver>,
    clock: SharedClock,
    cache: RwLock<HashMap<String, CacheEntry>>,
    settle_delay: Duration,
    growth_threshold: usize,
    cache_ttl: Duration,
    probe_lines: i64,
}

impl Detector {
    pub fn new(
        driver: Arc<dyn TerminalDriver>,
        clock: SharedClock,
        settle_delay: Duration,
        growth_threshold: usize,
        cache_ttl: Duration,
        probe_lines: i64,
    ) -> Self {
        Self {
            driver,
            clock,
            cache: RwLock::new(HashMap::new()),
            settle_delay,
            growth_threshold,
            cache_ttl,
            probe_lines,
        }
    }

    /// Drop the cached result for `name`. The Agent Initializer calls this
    /// after every state-changing action (multi-char send-keys, session
    /// recreate, a `C-c` burst) so the next probe reflects reality.
    pub async fn invalidate(&self, name: &SessionName) {
        self.cache.write().await.remove(name.as_str());
    }

    /// Answer whether the interactive AI CLI is currently running in
    /// `name`'s session, running the slash-probe protocol unless a fresh
    /// cached answer exists.
    pub async fn is_cli_interactive(&self, name: &SessionName) -> bool {
        if let Some(cached) = self.cached(name).await {
            return cached;
        }
        let result = self.probe(name).await;
        self.cache
            .write()
            .await
            .insert(name.as_str().to_string(), CacheEntry { value: result, taken_at: std::time::Instant::now() });
        result
    }

    async fn cached(&self, name: &SessionName) -> Option<bool> {
        let cache = self.cache.read().await;
        let entry = cache.get(name.as_str())?;
        if entry.taken_at.elapsed() > self.cache_ttl {
            return None;
        }
        Some(entry.value)
    }

    async fn probe(&self, name: &SessionName) -> bool {
        let before = match self.driver.capture_pane(name, self.probe_lines).await {
            Ok(text) => self.sample(name, text),
            Err(crate::error::DriverError::NotFound(_)) => return false,
            Err(e) => {
                warn!(session = %name, error = %e, "detector.probe_timeout");
                return false;
            }
        };

        if (self.driver.send_keys(name, &[Key::Slash]).await).is_err() {
            return false;
        }

        tokio::time::sleep(self.settle_delay).await;

        let after = match self.driver.capture_pane(name, self.probe_lines).await {
            Ok(text) => self.sample(name, text),
            Err(crate::error::DriverError::NotFound(_)) => return false,
            Err(e) => {
                warn!(session = %name, error = %e, "detector.probe_timeout");
                // Escape is sent on every error branch except NotFound, so a
                // missing session is reported without touching a pane that
                // isn't there.
                let _ = self.driver.send_keys(name, &[Key::Escape]).await;
                return false;
            }
        };

        let _ = self.driver.send_keys(name, &[Key::Escape]).await;

        debug!(
            session = %name,
            before_bytes = before.byte_len,
            after_bytes = after.byte_len,
            "detector.probe_sampled"
        );

        grew_with_preserved_prefix(&before.text, &after.text, self.growth_threshold)
    }

    /// Stamp a raw pane capture as a [`PaneProbeSample`] at the current
    /// wall-clock time.
    fn sample(&self, name: &SessionName, text: String) -> PaneProbeSample {
        PaneProbeSample::new(name.clone(), self.clock.utc_now(), text)
    }
}

/// CLI is interactive iff `after` is longer than `before` by more than
/// `growth_threshold` bytes AND `after` contains `before` as a prefix, or
/// `before`'s tail (last 200 bytes) appears within `after` — guarding
/// against unrelated pane scrollback shifting the whole buffer.
fn grew_with_preserved_prefix(before: &str, after: &str, growth_threshold: usize) -> bool {
    if after.len() <= before.len() + growth_threshold {
        return false;
    }
    if after.starts_with(before) {
        return true;
    }
    let mut tail_start = before.len().saturating_sub(200);
    while tail_start > 0 && !before.is_char_boundary(tail_start) {
        tail_start -= 1;
    }
    let tail = &before[tail_start..];
    !tail.is_empty() && after.contains(tail)
}

#[cfg(test)]
#[path = "detector_tests.rs"]
mod tests;
