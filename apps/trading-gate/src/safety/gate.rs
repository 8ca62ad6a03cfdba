//! Safety gate orchestrating every check before a mutating broker call.
//!
//! Checks run in fixed order: kill switch, rate limit, daily ceilings,
//! account policy, feature flags. The kill switch short-circuits with a
//! single error; every other check runs to completion and accumulates, so
//! a caller sees all reasons an operation was rejected at once.
//!
//! The whole validation is synchronous and mutates the rate window and
//! daily counters under one lock with no suspension point, so a passing
//! check and its reservation are atomic: two concurrent operations can
//! never both pass a check that only one should have passed, and
//! admissions happen in call order.

use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::audit::AuditLogger;
use super::daily_limits::{DailyLimitsTracker, DailyStats};
use super::kill_switch::EmergencyKillSwitch;
use super::rate_limiter::RateLimiter;
use crate::config::SafetyConfig;
use crate::models::OperationKind;

/// Outcome of a safety validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyVerdict {
    /// True when the operation may proceed to the broker.
    pub is_safe: bool,
    /// Every reason the operation was rejected, in check order.
    pub errors: Vec<String>,
    /// Non-blocking advisories.
    pub warnings: Vec<String>,
    /// Names of the checks that executed, in execution order.
    pub checks_performed: Vec<String>,
}

impl SafetyVerdict {
    fn new() -> Self {
        Self {
            is_safe: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            checks_performed: Vec::new(),
        }
    }

    fn reject(&mut self, reason: String) {
        self.is_safe = false;
        self.errors.push(reason);
    }
}

/// Counters mutated during validation; kept behind one lock so the
/// check-and-reserve sequence never interleaves.
#[derive(Debug)]
struct GateCounters {
    rate: RateLimiter,
    daily: DailyLimitsTracker,
}

/// Orchestrates kill switch, rate limiting, daily ceilings, account
/// policy, and feature flags into one validation entry point.
#[derive(Debug)]
pub struct SafetyGate {
    config: SafetyConfig,
    kill_switch: Arc<EmergencyKillSwitch>,
    audit: Arc<AuditLogger>,
    counters: Mutex<GateCounters>,
}

impl SafetyGate {
    /// Create a gate from configuration and shared collaborators.
    #[must_use]
    pub fn new(
        config: SafetyConfig,
        kill_switch: Arc<EmergencyKillSwitch>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        let counters = GateCounters {
            rate: RateLimiter::new(config.rate_limits.clone()),
            daily: DailyLimitsTracker::new(config.max_daily_orders),
        };
        Self {
            config,
            kill_switch,
            audit,
            counters: Mutex::new(counters),
        }
    }

    /// Validate a trading operation. Must precede every mutating broker
    /// call; read-only queries bypass the gate.
    ///
    /// Every invocation - safe or not - produces exactly one audit record.
    pub fn validate_trading_operation(
        &self,
        kind: OperationKind,
        payload: &Value,
    ) -> SafetyVerdict {
        let mut verdict = SafetyVerdict::new();

        // Check 1: kill switch. Dispositive - skip everything else.
        verdict.checks_performed.push("kill_switch".to_string());
        if self.kill_switch.is_active() {
            let reason = self
                .kill_switch
                .state()
                .reason
                .unwrap_or_else(|| "no reason recorded".to_string());
            verdict.reject(format!("trading kill switch is active: {reason}"));
            self.audit.record_decision(kind, payload, &verdict);
            return verdict;
        }

        {
            let mut counters = self
                .counters
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);

            // Check 2: rate limit. A pass reserves the slot.
            verdict.checks_performed.push("rate_limit".to_string());
            if !counters.rate.admit(kind) {
                verdict.reject(format!(
                    "rate limit exceeded for {kind}: max {} per {}s",
                    self.config.rate_limits.ceiling(kind),
                    self.config.rate_limits.window_secs
                ));
            }

            // Check 3: daily ceilings (order placement only). A passing
            // count check reserves the slot; volume is informational.
            if kind == OperationKind::OrderPlacement {
                verdict.checks_performed.push("daily_order_count".to_string());
                if let Err(e) = counters.daily.check_and_increment_order_count() {
                    verdict.reject(e.to_string());
                }

                verdict.checks_performed.push("daily_volume".to_string());
                if let Some(notional) = extract_notional(payload) {
                    counters.daily.add_order_volume(notional);
                    let stats = counters.daily.get_daily_stats();
                    if stats.volume > self.config.daily_volume_warn_threshold {
                        verdict.warnings.push(format!(
                            "daily volume {} exceeds advisory threshold {}",
                            stats.volume, self.config.daily_volume_warn_threshold
                        ));
                    }
                }
            }
        }

        self.check_account_policy(kind, payload, &mut verdict);
        self.check_order_size(kind, payload, &mut verdict);
        self.check_feature_flags(kind, payload, &mut verdict);

        self.audit.record_decision(kind, payload, &verdict);
        verdict
    }

    /// Check 4a: paper-account enforcement by prefix match.
    fn check_account_policy(
        &self,
        kind: OperationKind,
        payload: &Value,
        verdict: &mut SafetyVerdict,
    ) {
        verdict.checks_performed.push("account_policy".to_string());
        if !self.config.paper_only {
            return;
        }

        match payload.get("account").and_then(Value::as_str) {
            Some(account) => {
                if !self.config.is_paper_account(account) {
                    verdict.reject(format!(
                        "account {account} is not a recognized paper account (allowed prefixes: {})",
                        self.config.paper_account_prefixes.join(", ")
                    ));
                }
            }
            None if kind == OperationKind::AccountSwitch => {
                verdict.reject("account switch requires an account id".to_string());
            }
            None => {
                verdict
                    .warnings
                    .push("no account in payload; paper-only policy not verified".to_string());
            }
        }
    }

    /// Check 4b: per-order size and notional ceilings.
    fn check_order_size(&self, kind: OperationKind, payload: &Value, verdict: &mut SafetyVerdict) {
        if !matches!(
            kind,
            OperationKind::OrderPlacement | OperationKind::OrderModification
        ) {
            return;
        }
        verdict.checks_performed.push("order_size".to_string());

        if let Some(quantity) = extract_decimal(payload, "quantity") {
            if quantity > self.config.max_order_size {
                verdict.reject(format!(
                    "order size {quantity} exceeds maximum {}",
                    self.config.max_order_size
                ));
            }

            if let Some(price) = extract_price(payload) {
                let notional = quantity * price;
                if notional > self.config.max_order_value {
                    verdict.reject(format!(
                        "order value {notional} exceeds maximum {}",
                        self.config.max_order_value
                    ));
                }
            }
        }
    }

    /// Check 5: global and per-category feature flags.
    fn check_feature_flags(
        &self,
        kind: OperationKind,
        payload: &Value,
        verdict: &mut SafetyVerdict,
    ) {
        verdict.checks_performed.push("feature_flags".to_string());

        if kind.is_mutating() && !self.config.trading_enabled {
            verdict.reject("trading is disabled by configuration".to_string());
        }

        let enabled = match kind {
            OperationKind::OrderPlacement => self.config.order_placement_enabled,
            OperationKind::OrderModification => self.config.order_modification_enabled,
            OperationKind::OrderCancellation => self.config.order_cancellation_enabled,
            OperationKind::AccountSwitch => self.config.account_switching_enabled,
            OperationKind::MarketData => true,
        };
        if !enabled {
            verdict.reject(format!("{kind} is disabled by configuration"));
        }

        if is_protective_payload(payload) && !self.config.protective_orders_enabled {
            verdict.reject("protective order trading is disabled by configuration".to_string());
        }
    }

    /// Snapshot of today's counters.
    #[must_use]
    pub fn daily_stats(&self) -> DailyStats {
        self.counters
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .daily
            .get_daily_stats()
    }

    /// The kill switch this gate consults.
    #[must_use]
    pub fn kill_switch(&self) -> &Arc<EmergencyKillSwitch> {
        &self.kill_switch
    }

    /// The audit logger this gate records to.
    #[must_use]
    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }
}

/// Pull a decimal out of a payload field, accepting numbers and strings.
fn extract_decimal(payload: &Value, key: &str) -> Option<Decimal> {
    match payload.get(key)? {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Best price available for notional computation.
fn extract_price(payload: &Value) -> Option<Decimal> {
    ["limit_price", "price", "entry_price", "stop_price"]
        .iter()
        .find_map(|key| extract_decimal(payload, key))
}

/// Notional value (quantity x price) when both are present.
fn extract_notional(payload: &Value) -> Option<Decimal> {
    Some(extract_decimal(payload, "quantity")? * extract_price(payload)?)
}

/// Whether the payload describes a stop-family order.
fn is_protective_payload(payload: &Value) -> bool {
    if payload.get("stop_price").is_some()
        || payload.get("trail_amount").is_some()
        || payload.get("trail_percent").is_some()
    {
        return true;
    }
    payload
        .get("order_type")
        .and_then(Value::as_str)
        .is_some_and(|t| matches!(t, "STOP" | "STOP_LIMIT" | "TRAILING_STOP"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_gate(config: SafetyConfig) -> SafetyGate {
        let kill_switch = Arc::new(EmergencyKillSwitch::new("CODE"));
        let audit = Arc::new(AuditLogger::new(64));
        SafetyGate::new(config, kill_switch, audit)
    }

    fn order_payload() -> Value {
        json!({
            "symbol": "AAPL",
            "side": "BUY",
            "quantity": 100,
            "limit_price": 150.0,
            "account": "DU1234567"
        })
    }

    #[test]
    fn test_clean_order_passes_all_checks() {
        let gate = make_gate(SafetyConfig::default());
        let verdict =
            gate.validate_trading_operation(OperationKind::OrderPlacement, &order_payload());

        assert!(verdict.is_safe, "errors: {:?}", verdict.errors);
        assert!(verdict.errors.is_empty());
        assert_eq!(
            verdict.checks_performed,
            vec![
                "kill_switch",
                "rate_limit",
                "daily_order_count",
                "daily_volume",
                "account_policy",
                "order_size",
                "feature_flags"
            ]
        );
    }

    #[test]
    fn test_kill_switch_short_circuits() {
        let gate = make_gate(SafetyConfig::default());
        gate.kill_switch().activate("maintenance");

        let verdict =
            gate.validate_trading_operation(OperationKind::OrderPlacement, &order_payload());

        assert!(!verdict.is_safe);
        assert_eq!(verdict.errors.len(), 1);
        assert!(verdict.errors[0].contains("kill switch is active"));
        // Remaining checks were skipped entirely
        assert_eq!(verdict.checks_performed, vec!["kill_switch"]);
    }

    #[test]
    fn test_errors_accumulate_past_first_failure() {
        let config = SafetyConfig {
            max_order_size: Decimal::new(10, 0),
            order_placement_enabled: false,
            ..Default::default()
        };
        let gate = make_gate(config);

        let verdict =
            gate.validate_trading_operation(OperationKind::OrderPlacement, &order_payload());

        assert!(!verdict.is_safe);
        // Both the size ceiling and the disabled flag are reported
        assert!(verdict.errors.iter().any(|e| e.contains("order size")));
        assert!(verdict.errors.iter().any(|e| e.contains("disabled")));
    }

    #[test]
    fn test_rate_limit_reserves_during_validation() {
        let gate = make_gate(SafetyConfig::default());
        let payload = json!({"symbol": "AAPL"});

        for _ in 0..30 {
            let verdict =
                gate.validate_trading_operation(OperationKind::MarketData, &payload);
            assert!(verdict.is_safe);
        }
        let verdict = gate.validate_trading_operation(OperationKind::MarketData, &payload);
        assert!(!verdict.is_safe);
        assert!(verdict.errors[0].contains("rate limit exceeded"));
    }

    #[test]
    fn test_non_paper_account_rejected() {
        let gate = make_gate(SafetyConfig::default());
        let mut payload = order_payload();
        payload["account"] = json!("U9999999");

        let verdict = gate.validate_trading_operation(OperationKind::OrderPlacement, &payload);
        assert!(!verdict.is_safe);
        assert!(verdict.errors.iter().any(|e| e.contains("paper account")));
    }

    #[test]
    fn test_missing_account_warns_but_passes() {
        let gate = make_gate(SafetyConfig::default());
        let mut payload = order_payload();
        payload.as_object_mut().unwrap().remove("account");

        let verdict = gate.validate_trading_operation(OperationKind::OrderPlacement, &payload);
        assert!(verdict.is_safe);
        assert!(!verdict.warnings.is_empty());
    }

    #[test]
    fn test_notional_ceiling() {
        let gate = make_gate(SafetyConfig::default());
        let payload = json!({
            "symbol": "AAPL",
            "quantity": 500,
            "limit_price": 400.0,
            "account": "DU1234567"
        });

        let verdict = gate.validate_trading_operation(OperationKind::OrderPlacement, &payload);
        assert!(!verdict.is_safe);
        assert!(verdict.errors.iter().any(|e| e.contains("order value")));
    }

    #[test]
    fn test_protective_flag_blocks_stop_orders() {
        let config = SafetyConfig {
            protective_orders_enabled: false,
            ..Default::default()
        };
        let gate = make_gate(config);
        let payload = json!({
            "symbol": "AAPL",
            "quantity": 100,
            "stop_price": 145.0,
            "account": "DU1234567"
        });

        let verdict = gate.validate_trading_operation(OperationKind::OrderPlacement, &payload);
        assert!(!verdict.is_safe);
        assert!(verdict.errors.iter().any(|e| e.contains("protective")));
    }

    #[test]
    fn test_every_validation_produces_one_audit_record() {
        let gate = make_gate(SafetyConfig::default());
        gate.validate_trading_operation(OperationKind::OrderPlacement, &order_payload());
        gate.kill_switch().activate("halt");
        gate.validate_trading_operation(OperationKind::OrderPlacement, &order_payload());

        assert_eq!(gate.audit().len(), 2);
    }

    #[test]
    fn test_daily_stats_snapshot() {
        let gate = make_gate(SafetyConfig::default());
        gate.validate_trading_operation(OperationKind::OrderPlacement, &order_payload());

        let stats = gate.daily_stats();
        assert_eq!(stats.order_count, 1);
        assert_eq!(stats.volume, Decimal::new(15_000, 0));
    }
}
