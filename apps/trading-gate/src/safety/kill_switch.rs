//! Emergency kill switch: a global, manually-operated circuit breaker
//! blocking all trading until explicitly cleared.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kill switch state snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KillSwitchState {
    /// Whether trading is halted.
    pub active: bool,
    /// Reason recorded at activation.
    pub reason: Option<String>,
    /// When the switch was activated.
    pub activated_at: Option<DateTime<Utc>>,
}

/// Outcome of an activation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationStatus {
    /// The switch transitioned to active.
    Activated,
    /// The switch was already active; nothing was overwritten.
    AlreadyActivated,
}

/// Receipt returned by [`EmergencyKillSwitch::activate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationReceipt {
    /// What happened.
    pub status: ActivationStatus,
    /// The reason in effect (the original one when already active).
    pub reason: String,
    /// The activation timestamp in effect.
    pub activated_at: DateTime<Utc>,
}

/// Outcome of a deactivation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeactivationStatus {
    /// The switch transitioned to inactive.
    Deactivated,
    /// The override code did not match; state is unchanged.
    InvalidOverrideCode,
}

/// Global manual circuit breaker for all trading.
#[derive(Debug)]
pub struct EmergencyKillSwitch {
    override_code: String,
    state: Mutex<KillSwitchState>,
}

impl EmergencyKillSwitch {
    /// Create an inactive kill switch guarded by the given override code.
    #[must_use]
    pub fn new(override_code: impl Into<String>) -> Self {
        Self {
            override_code: override_code.into(),
            state: Mutex::new(KillSwitchState::default()),
        }
    }

    /// Halt all trading.
    ///
    /// Idempotent and non-overwriting: activating an already-active switch
    /// returns `AlreadyActivated` and keeps the original reason/timestamp.
    pub fn activate(&self, reason: &str) -> ActivationReceipt {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if state.active {
            tracing::warn!(
                reason = %reason,
                original_reason = state.reason.as_deref().unwrap_or(""),
                "kill switch already active"
            );
            return ActivationReceipt {
                status: ActivationStatus::AlreadyActivated,
                reason: state.reason.clone().unwrap_or_default(),
                activated_at: state.activated_at.unwrap_or_else(Utc::now),
            };
        }

        let now = Utc::now();
        state.active = true;
        state.reason = Some(reason.to_string());
        state.activated_at = Some(now);
        drop(state);

        tracing::error!(reason = %reason, "KILL SWITCH ACTIVATED - all trading halted");

        ActivationReceipt {
            status: ActivationStatus::Activated,
            reason: reason.to_string(),
            activated_at: now,
        }
    }

    /// Clear the switch; only a matching override code transitions it.
    ///
    /// A wrong code leaves the state unchanged and reports the rejection;
    /// it never raises.
    pub fn deactivate(&self, override_code: &str) -> DeactivationStatus {
        if override_code != self.override_code {
            tracing::warn!("kill switch deactivation rejected: invalid override code");
            return DeactivationStatus::InvalidOverrideCode;
        }

        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        state.active = false;
        state.reason = None;
        state.activated_at = None;
        drop(state);

        tracing::warn!("kill switch deactivated - trading resumed");
        DeactivationStatus::Deactivated
    }

    /// Whether trading is currently halted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .active
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> KillSwitchState {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activate_records_reason_and_timestamp() {
        let switch = EmergencyKillSwitch::new("CODE");
        let receipt = switch.activate("maintenance");

        assert_eq!(receipt.status, ActivationStatus::Activated);
        assert_eq!(receipt.reason, "maintenance");
        assert!(switch.is_active());
    }

    #[test]
    fn test_reactivation_keeps_original_reason() {
        let switch = EmergencyKillSwitch::new("CODE");
        let first = switch.activate("maintenance");
        let second = switch.activate("other");

        assert_eq!(second.status, ActivationStatus::AlreadyActivated);
        assert_eq!(second.reason, "maintenance");
        assert_eq!(second.activated_at, first.activated_at);
        assert_eq!(switch.state().reason.as_deref(), Some("maintenance"));
    }

    #[test]
    fn test_wrong_override_code_leaves_state_unchanged() {
        let switch = EmergencyKillSwitch::new("CODE");
        switch.activate("maintenance");

        assert_eq!(
            switch.deactivate("WRONG"),
            DeactivationStatus::InvalidOverrideCode
        );
        assert!(switch.is_active());
        assert_eq!(switch.state().reason.as_deref(), Some("maintenance"));
    }

    #[test]
    fn test_matching_override_code_clears_switch() {
        let switch = EmergencyKillSwitch::new("CODE");
        switch.activate("maintenance");

        assert_eq!(switch.deactivate("CODE"), DeactivationStatus::Deactivated);
        assert!(!switch.is_active());
        assert!(switch.state().reason.is_none());
    }
}
