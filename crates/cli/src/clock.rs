// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Injected time source.
//!
//! Every deadline and timestamp in the core goes through a [`Clock`] rather
//! than calling `Instant::now`/`Utc::now` directly, so integration tests can
//! drive deadlines deterministically.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

/// Time source used throughout the orchestrator.
pub trait Clock: Send + Sync {
    /// Monotonic instant, used for deadlines and elapsed-time checks.
    fn now(&self) -> Instant;
    /// Wall-clock time, used for `RegistrationRecord`/`WorkflowExecution`
    /// timestamps and the RFC3339 fields of the persisted state file.
    fn utc_now(&self) -> DateTime<Utc>;
}

/// Real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub type SharedClock = Arc<dyn Clock>;

/// Construct the production clock as a shared trait object.
pub fn system() -> SharedClock {
    Arc::new(SystemClock)
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use chrono::{DateTime, TimeZone, Utc};

    use super::Clock;

    /// Deterministic clock for tests: starts at a fixed instant and only
    /// advances when told to.
    pub struct FakeClock {
        instant: Mutex<Instant>,
        utc: Mutex<DateTime<Utc>>,
    }

    impl FakeClock {
        pub fn new() -> Self {
            Self {
                instant: Mutex::new(Instant::now()),
                utc: Mutex::new(Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_else(Utc::now)),
            }
        }

        pub fn advance(&self, by: Duration) {
            let mut instant = self.instant.lock().unwrap_or_else(|e| e.into_inner());
            *instant += by;
            let mut utc = self.utc.lock().unwrap_or_else(|e| e.into_inner());
            *utc += chrono::Duration::from_std(by).unwrap_or_default();
        }
    }

    impl Default for FakeClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            *self.instant.lock().unwrap_or_else(|e| e.into_inner())
        }

        fn utc_now(&self) -> DateTime<Utc> {
            *self.utc.lock().unwrap_or_else(|e| e.into_inner())
        }
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
