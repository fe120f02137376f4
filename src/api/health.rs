//! Shared refresh health for the /health endpoint.
//! Updated by the refresher after every run, read by the API.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

/// Refresh counters. Timestamps are Unix milliseconds, 0 = never.
#[derive(Default)]
pub struct HealthState {
    refreshes: AtomicU64,
    failed_refreshes: AtomicU64,
    last_success_at_ms: AtomicI64,
    last_attempt_failed: AtomicBool,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, at_ms: i64) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        self.last_success_at_ms.store(at_ms, Ordering::Relaxed);
        self.last_attempt_failed.store(false, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed_refreshes.fetch_add(1, Ordering::Relaxed);
        self.last_attempt_failed.store(true, Ordering::Relaxed);
    }

    pub fn refreshes(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    pub fn failed_refreshes(&self) -> u64 {
        self.failed_refreshes.load(Ordering::Relaxed)
    }

    pub fn last_success_at_ms(&self) -> Option<i64> {
        match self.last_success_at_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(ms),
        }
    }

    pub fn last_attempt_failed(&self) -> bool {
        self.last_attempt_failed.load(Ordering::Relaxed)
    }

    /// `starting` before the first success, `degraded` while the latest attempt failed.
    pub fn status(&self) -> &'static str {
        if self.last_success_at_ms().is_none() {
            "starting"
        } else if self.last_attempt_failed() {
            "degraded"
        } else {
            "ok"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions() {
        let health = HealthState::new();
        assert_eq!(health.status(), "starting");
        health.record_failure();
        assert_eq!(health.status(), "starting");
        health.record_success(1_700_000_000_000);
        assert_eq!(health.status(), "ok");
        health.record_failure();
        assert_eq!(health.status(), "degraded");
        assert_eq!(health.refreshes(), 1);
        assert_eq!(health.failed_refreshes(), 2);
        assert_eq!(health.last_success_at_ms(), Some(1_700_000_000_000));
    }
}
