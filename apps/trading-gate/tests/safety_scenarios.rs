//! Safety gate scenarios: rate windows, daily ceilings, kill switch.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use trading_gate::config::SafetyConfig;
use trading_gate::{
    ActivationStatus, AuditLogger, DeactivationStatus, EmergencyKillSwitch, OperationKind,
    SafetyGate,
};

fn make_gate(config: SafetyConfig) -> SafetyGate {
    let kill_switch = Arc::new(EmergencyKillSwitch::new("SAFETY_OVERRIDE_2024"));
    let audit = Arc::new(AuditLogger::new(4096));
    SafetyGate::new(config, kill_switch, audit)
}

fn order_payload() -> serde_json::Value {
    json!({
        "symbol": "AAPL",
        "side": "BUY",
        "quantity": 1,
        "limit_price": 10.0,
        "account": "DU1234567"
    })
}

#[test]
fn scenario_rate_window_drains_after_expiry() {
    // Ceiling 5 per 1s window (shortened from the default 60s so the
    // expiry leg of the scenario is testable without a minute-long sleep)
    let mut config = SafetyConfig::default();
    config.rate_limits.window_secs = 1;
    config.max_daily_orders = 1000;
    let gate = make_gate(config);

    for _ in 0..5 {
        let verdict =
            gate.validate_trading_operation(OperationKind::OrderPlacement, &order_payload());
        assert!(verdict.is_safe, "errors: {:?}", verdict.errors);
    }

    // Sixth call inside the window is denied
    let verdict = gate.validate_trading_operation(OperationKind::OrderPlacement, &order_payload());
    assert!(!verdict.is_safe);
    assert!(
        verdict
            .errors
            .iter()
            .any(|e| e.contains("rate limit exceeded"))
    );

    // After the window elapses the next call is admitted again
    std::thread::sleep(Duration::from_millis(1_100));
    let verdict = gate.validate_trading_operation(OperationKind::OrderPlacement, &order_payload());
    assert!(verdict.is_safe, "errors: {:?}", verdict.errors);
}

#[test]
fn scenario_daily_ceiling_holds_at_fifty() {
    let mut config = SafetyConfig::default();
    config.rate_limits.order_placement = 1000;
    config.max_daily_orders = 50;
    let gate = make_gate(config);

    for _ in 0..50 {
        let verdict =
            gate.validate_trading_operation(OperationKind::OrderPlacement, &order_payload());
        assert!(verdict.is_safe, "errors: {:?}", verdict.errors);
    }
    assert_eq!(gate.daily_stats().order_count, 50);

    // 51st fails and the count stays at 50
    let verdict = gate.validate_trading_operation(OperationKind::OrderPlacement, &order_payload());
    assert!(!verdict.is_safe);
    assert!(
        verdict
            .errors
            .iter()
            .any(|e| e.contains("daily order limit"))
    );
    assert_eq!(gate.daily_stats().order_count, 50);
}

#[test]
fn scenario_kill_switch_lifecycle() {
    let switch = EmergencyKillSwitch::new("SAFETY_OVERRIDE_2024");

    let receipt = switch.activate("maintenance");
    assert_eq!(receipt.status, ActivationStatus::Activated);
    assert!(switch.is_active());

    // Re-activation is idempotent and non-overwriting
    let receipt = switch.activate("other");
    assert_eq!(receipt.status, ActivationStatus::AlreadyActivated);
    assert_eq!(receipt.reason, "maintenance");

    // Wrong code leaves the switch active
    assert_eq!(
        switch.deactivate("WRONG"),
        DeactivationStatus::InvalidOverrideCode
    );
    assert!(switch.is_active());
    assert_eq!(switch.state().reason.as_deref(), Some("maintenance"));

    // Correct code clears it
    assert_eq!(
        switch.deactivate("SAFETY_OVERRIDE_2024"),
        DeactivationStatus::Deactivated
    );
    assert!(!switch.is_active());
}

#[test]
fn scenario_kill_switch_dominates_validation() {
    let gate = make_gate(SafetyConfig::default());
    gate.kill_switch().activate("maintenance");

    let verdict = gate.validate_trading_operation(OperationKind::OrderPlacement, &order_payload());

    assert!(!verdict.is_safe);
    assert_eq!(verdict.errors.len(), 1);
    assert!(verdict.errors[0].contains("kill switch is active"));
    assert!(verdict.errors[0].contains("maintenance"));
    assert_eq!(verdict.checks_performed, vec!["kill_switch"]);
}

#[test]
fn every_validation_yields_exactly_one_audit_record() {
    let mut config = SafetyConfig::default();
    config.rate_limits.order_placement = 2;
    let gate = make_gate(config);

    // Safe, safe, rate-limited, then kill-switched: four records
    gate.validate_trading_operation(OperationKind::OrderPlacement, &order_payload());
    gate.validate_trading_operation(OperationKind::OrderPlacement, &order_payload());
    gate.validate_trading_operation(OperationKind::OrderPlacement, &order_payload());
    gate.kill_switch().activate("halt");
    gate.validate_trading_operation(OperationKind::OrderPlacement, &order_payload());

    assert_eq!(gate.audit().len(), 4);
    let records = gate.audit().recent(10);
    assert!(records[0].verdict.is_safe);
    assert!(!records[2].verdict.is_safe);
    assert!(!records[3].verdict.is_safe);
    // Session id is constant across the process
    assert!(records.iter().all(|r| r.session_id == records[0].session_id));
}

#[test]
fn sensitive_payload_fields_are_redacted_in_audit() {
    let gate = make_gate(SafetyConfig::default());
    let payload = json!({
        "symbol": "AAPL",
        "quantity": 1,
        "account": "DU1234567",
        "api_secret": "super-sensitive"
    });

    gate.validate_trading_operation(OperationKind::MarketData, &payload);

    let records = gate.audit().recent(1);
    assert_eq!(
        records[0].sanitized_payload["api_secret"],
        trading_gate::safety::REDACTION_MARKER
    );
    assert_eq!(records[0].sanitized_payload["account"], "DU1234567");
}
