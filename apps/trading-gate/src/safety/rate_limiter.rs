//! Sliding-window admission control per operation kind.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::RateLimitsConfig;
use crate::models::OperationKind;

/// Rate limiter bounding each operation kind over a trailing window.
///
/// Admission purges stale timestamps, compares the remaining count against
/// the kind's ceiling, and records the new timestamp only on success, so a
/// denied call never consumes a slot.
#[derive(Debug)]
pub struct RateLimiter {
    /// Trailing window length.
    window: Duration,
    /// Per-kind ceilings.
    limits: RateLimitsConfig,
    /// Timestamps of admitted calls, per kind.
    history: HashMap<OperationKind, Vec<Instant>>,
}

impl RateLimiter {
    /// Create a rate limiter from configured ceilings.
    #[must_use]
    pub fn new(limits: RateLimitsConfig) -> Self {
        Self {
            window: Duration::from_secs(limits.window_secs),
            limits,
            history: HashMap::new(),
        }
    }

    /// Check and reserve an admission slot for `kind`.
    ///
    /// Returns true when the call is admitted; the slot is recorded as part
    /// of the check itself.
    pub fn admit(&mut self, kind: OperationKind) -> bool {
        self.admit_at(kind, Instant::now())
    }

    /// Admission check against an explicit clock reading.
    pub(crate) fn admit_at(&mut self, kind: OperationKind, now: Instant) -> bool {
        self.purge_stale_kinds(now);

        let ceiling = self.limits.ceiling(kind);
        let window = self.window;
        let stamps = self.history.entry(kind).or_default();
        stamps.retain(|t| now.saturating_duration_since(*t) < window);

        if stamps.len() >= ceiling {
            return false;
        }

        stamps.push(now);
        true
    }

    /// Count of admitted calls for `kind` still inside the window.
    #[must_use]
    pub fn in_window(&self, kind: OperationKind) -> usize {
        self.in_window_at(kind, Instant::now())
    }

    pub(crate) fn in_window_at(&self, kind: OperationKind, now: Instant) -> usize {
        self.history.get(&kind).map_or(0, |stamps| {
            stamps
                .iter()
                .filter(|t| now.saturating_duration_since(**t) < self.window)
                .count()
        })
    }

    /// Drop kinds whose entire history has aged out, bounding memory.
    fn purge_stale_kinds(&mut self, now: Instant) {
        let window = self.window;
        self.history
            .retain(|_, stamps| stamps.iter().any(|t| now.saturating_duration_since(*t) < window));
    }
}
