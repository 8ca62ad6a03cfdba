//! Safety limit configuration: ceilings, rate limits, account policy.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::OperationKind;

/// Per-operation-kind rate ceilings over a trailing window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitsConfig {
    /// Trailing window length in seconds.
    #[serde(default = "default_rate_window_secs")]
    pub window_secs: u64,
    /// Max order placements per window.
    #[serde(default = "default_order_placement_ceiling")]
    pub order_placement: usize,
    /// Max order modifications per window.
    #[serde(default = "default_order_modification_ceiling")]
    pub order_modification: usize,
    /// Max order cancellations per window.
    #[serde(default = "default_order_cancellation_ceiling")]
    pub order_cancellation: usize,
    /// Max market data requests per window.
    #[serde(default = "default_market_data_ceiling")]
    pub market_data: usize,
    /// Max account switches per window.
    #[serde(default = "default_account_switch_ceiling")]
    pub account_switch: usize,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            window_secs: default_rate_window_secs(),
            order_placement: default_order_placement_ceiling(),
            order_modification: default_order_modification_ceiling(),
            order_cancellation: default_order_cancellation_ceiling(),
            market_data: default_market_data_ceiling(),
            account_switch: default_account_switch_ceiling(),
        }
    }
}

impl RateLimitsConfig {
    /// Ceiling for the given operation kind.
    #[must_use]
    pub const fn ceiling(&self, kind: OperationKind) -> usize {
        match kind {
            OperationKind::OrderPlacement => self.order_placement,
            OperationKind::OrderModification => self.order_modification,
            OperationKind::OrderCancellation => self.order_cancellation,
            OperationKind::MarketData => self.market_data,
            OperationKind::AccountSwitch => self.account_switch,
        }
    }
}

/// Safety configuration consumed by the gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Global trading switch; mutating operations are refused when false.
    #[serde(default = "default_true")]
    pub trading_enabled: bool,
    /// Allow new order placement.
    #[serde(default = "default_true")]
    pub order_placement_enabled: bool,
    /// Allow order modification.
    #[serde(default = "default_true")]
    pub order_modification_enabled: bool,
    /// Allow order cancellation.
    #[serde(default = "default_true")]
    pub order_cancellation_enabled: bool,
    /// Allow protective (stop-family) order placement.
    #[serde(default = "default_true")]
    pub protective_orders_enabled: bool,
    /// Allow switching the active account.
    #[serde(default)]
    pub account_switching_enabled: bool,
    /// Restrict trading to paper accounts.
    #[serde(default = "default_true")]
    pub paper_only: bool,
    /// Account prefixes recognised as paper accounts.
    #[serde(default = "default_paper_prefixes")]
    pub paper_account_prefixes: Vec<String>,
    /// Maximum quantity for a single order.
    #[serde(default = "default_max_order_size")]
    pub max_order_size: Decimal,
    /// Maximum notional value for a single order.
    #[serde(default = "default_max_order_value")]
    pub max_order_value: Decimal,
    /// Maximum orders per calendar day.
    #[serde(default = "default_max_daily_orders")]
    pub max_daily_orders: u32,
    /// Daily notional volume above which a warning is raised
    /// (informational; never a hard rejection).
    #[serde(default = "default_daily_volume_warn")]
    pub daily_volume_warn_threshold: Decimal,
    /// Per-kind rate ceilings.
    #[serde(default)]
    pub rate_limits: RateLimitsConfig,
    /// Override code required to clear the kill switch.
    /// Loaded from `TRADING_GATE_OVERRIDE_CODE` when set.
    #[serde(default = "default_override_code")]
    pub kill_switch_override_code: String,
    /// Number of audit records retained in memory.
    #[serde(default = "default_audit_capacity")]
    pub audit_capacity: usize,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            trading_enabled: true,
            order_placement_enabled: true,
            order_modification_enabled: true,
            order_cancellation_enabled: true,
            protective_orders_enabled: true,
            account_switching_enabled: false,
            paper_only: true,
            paper_account_prefixes: default_paper_prefixes(),
            max_order_size: default_max_order_size(),
            max_order_value: default_max_order_value(),
            max_daily_orders: default_max_daily_orders(),
            daily_volume_warn_threshold: default_daily_volume_warn(),
            rate_limits: RateLimitsConfig::default(),
            kill_switch_override_code: default_override_code(),
            audit_capacity: default_audit_capacity(),
        }
    }
}

impl SafetyConfig {
    /// Returns true when the account id matches a configured paper prefix.
    #[must_use]
    pub fn is_paper_account(&self, account_id: &str) -> bool {
        self.paper_account_prefixes
            .iter()
            .any(|p| account_id.starts_with(p.as_str()))
    }
}

const fn default_true() -> bool {
    true
}

const fn default_rate_window_secs() -> u64 {
    60
}

const fn default_order_placement_ceiling() -> usize {
    5
}

const fn default_order_modification_ceiling() -> usize {
    10
}

const fn default_order_cancellation_ceiling() -> usize {
    10
}

const fn default_market_data_ceiling() -> usize {
    30
}

const fn default_account_switch_ceiling() -> usize {
    2
}

fn default_paper_prefixes() -> Vec<String> {
    vec!["DU".to_string(), "DF".to_string()]
}

fn default_max_order_size() -> Decimal {
    Decimal::new(1000, 0)
}

fn default_max_order_value() -> Decimal {
    Decimal::new(50_000, 0)
}

const fn default_max_daily_orders() -> u32 {
    50
}

fn default_daily_volume_warn() -> Decimal {
    Decimal::new(250_000, 0)
}

fn default_override_code() -> String {
    "SAFETY_OVERRIDE_2024".to_string()
}

const fn default_audit_capacity() -> usize {
    2048
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safety_config_defaults() {
        let config = SafetyConfig::default();
        assert!(config.trading_enabled);
        assert!(config.paper_only);
        assert_eq!(config.max_daily_orders, 50);
        assert_eq!(config.rate_limits.order_placement, 5);
        assert_eq!(config.rate_limits.market_data, 30);
        assert_eq!(config.rate_limits.window_secs, 60);
    }

    #[test]
    fn test_paper_account_prefix_match() {
        let config = SafetyConfig::default();
        assert!(config.is_paper_account("DU1234567"));
        assert!(config.is_paper_account("DF7654321"));
        assert!(!config.is_paper_account("U1234567"));
    }

    #[test]
    fn test_ceiling_per_kind() {
        let limits = RateLimitsConfig::default();
        assert_eq!(limits.ceiling(OperationKind::OrderPlacement), 5);
        assert_eq!(limits.ceiling(OperationKind::MarketData), 30);
        assert_eq!(limits.ceiling(OperationKind::AccountSwitch), 2);
    }
}
