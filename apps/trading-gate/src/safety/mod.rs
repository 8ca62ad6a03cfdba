//! Trading safety: gate, rate limiting, daily ceilings, kill switch, audit.

mod audit;
mod daily_limits;
mod gate;
mod kill_switch;
mod rate_limiter;

pub use audit::{AuditLogger, AuditRecord, REDACTION_MARKER, sanitize_payload};
pub use daily_limits::{DailyLimitExceeded, DailyLimitsTracker, DailyStats};
pub use gate::{SafetyGate, SafetyVerdict};
pub use kill_switch::{
    ActivationReceipt, ActivationStatus, DeactivationStatus, EmergencyKillSwitch, KillSwitchState,
};
pub use rate_limiter::RateLimiter;
