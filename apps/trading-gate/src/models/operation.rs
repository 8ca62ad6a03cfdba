//! Trading operation kinds arriving from the tool-invocation layer.

use serde::{Deserialize, Serialize};

/// Kind of trading operation being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Placing a new order.
    OrderPlacement,
    /// Modifying an existing order.
    OrderModification,
    /// Cancelling an existing order.
    OrderCancellation,
    /// Market data request.
    MarketData,
    /// Switching the active account.
    AccountSwitch,
}

impl OperationKind {
    /// Stable snake_case name used in audit records and log fields.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OrderPlacement => "order_placement",
            Self::OrderModification => "order_modification",
            Self::OrderCancellation => "order_cancellation",
            Self::MarketData => "market_data",
            Self::AccountSwitch => "account_switch",
        }
    }

    /// Returns true if the operation mutates broker state.
    #[must_use]
    pub const fn is_mutating(&self) -> bool {
        !matches!(self, Self::MarketData)
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A trading operation with its raw payload as handed over by the
/// tool-invocation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingOperation {
    /// Operation kind.
    pub kind: OperationKind,
    /// Raw request payload (JSON object).
    pub payload: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_kind_names() {
        assert_eq!(OperationKind::OrderPlacement.as_str(), "order_placement");
        assert_eq!(OperationKind::AccountSwitch.as_str(), "account_switch");
    }

    #[test]
    fn test_market_data_is_read_only() {
        assert!(!OperationKind::MarketData.is_mutating());
        assert!(OperationKind::OrderPlacement.is_mutating());
        assert!(OperationKind::OrderCancellation.is_mutating());
    }
}
