//! Protective-order monitor configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the protective-order status poller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Polling interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How long a terminal order stays queryable before cleanup, in seconds.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    /// Number of status transitions retained in memory.
    #[serde(default = "default_max_transitions")]
    pub max_transitions: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            retention_secs: default_retention_secs(),
            max_transitions: default_max_transitions(),
        }
    }
}

impl MonitorConfig {
    /// Polling interval as a `Duration`.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Retention window as a `Duration`.
    #[must_use]
    pub const fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

const fn default_poll_interval_ms() -> u64 {
    2_000
}

const fn default_retention_secs() -> u64 {
    300
}

const fn default_max_transitions() -> usize {
    512
}
