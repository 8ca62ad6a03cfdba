//! Order-related types for lifecycle tracking.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    /// Buy order.
    Buy,
    /// Sell order.
    Sell,
}

impl OrderSide {
    /// The opposite side (used for bracket exit legs).
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type (market, limit, stop family).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Market order - execute at best available price.
    Market,
    /// Limit order - execute at specified price or better.
    Limit,
    /// Stop order - becomes market order when stop price is reached.
    Stop,
    /// Stop-limit order - becomes limit order when stop price is reached.
    StopLimit,
    /// Trailing stop order - stop price trails the market by an offset.
    TrailingStop,
}

impl OrderType {
    /// Returns true for stop-family orders placed for risk mitigation.
    #[must_use]
    pub const fn is_protective(&self) -> bool {
        matches!(self, Self::Stop | Self::StopLimit | Self::TrailingStop)
    }
}

/// Time in force for orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeInForce {
    /// Valid for current trading day only.
    Day,
    /// Good-til-canceled.
    Gtc,
    /// Immediate-or-cancel (fill immediately, cancel remainder).
    Ioc,
    /// Fill-or-kill (all or nothing, immediate execution required).
    Fok,
}

/// Order status in the lifecycle.
///
/// `Submitted → (PartiallyFilled) → Filled | Cancelled | Rejected`.
/// `Modified` is a transient marker applied after a successful revision;
/// it never blocks later transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order submitted to the broker.
    Submitted,
    /// Order partially filled.
    PartiallyFilled,
    /// Order completely filled.
    Filled,
    /// Order cancelled.
    Cancelled,
    /// Order rejected by the broker.
    Rejected,
    /// Order revised in place (transient marker).
    Modified,
}

impl OrderStatus {
    /// Returns true if the order is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled | Self::Rejected)
    }

    /// Returns true if the order is still working at the broker.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Submitted | Self::PartiallyFilled | Self::Modified)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Submitted => write!(f, "SUBMITTED"),
            Self::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            Self::Filled => write!(f, "FILLED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Modified => write!(f, "MODIFIED"),
        }
    }
}

/// A single execution against an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    /// Execution price.
    pub price: Decimal,
    /// Executed quantity.
    pub quantity: Decimal,
    /// Execution timestamp (ISO 8601).
    pub timestamp: String,
}

/// Locally tracked order state, keyed by the broker-assigned order id.
///
/// Created on broker acknowledgement of placement; revised in place by
/// modification; moved to the retained completed set on a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderState {
    /// Broker-assigned order ID (unique).
    pub order_id: String,
    /// Instrument symbol.
    pub symbol: String,
    /// Exchange the order routes to.
    pub exchange: String,
    /// Quote currency.
    pub currency: String,
    /// Order side.
    pub side: OrderSide,
    /// Requested quantity.
    pub quantity: Decimal,
    /// Order type.
    pub order_type: OrderType,
    /// Limit price (if applicable).
    pub limit_price: Option<Decimal>,
    /// Stop price (if applicable).
    pub stop_price: Option<Decimal>,
    /// Trailing amount in price units (if applicable).
    pub trail_amount: Option<Decimal>,
    /// Trailing amount as a percentage (if applicable).
    pub trail_percent: Option<Decimal>,
    /// Time in force.
    pub time_in_force: TimeInForce,
    /// Current status.
    pub status: OrderStatus,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
    /// Last update timestamp (ISO 8601).
    pub last_update_at: String,
    /// Executions recorded against this order, in arrival order.
    pub fills: Vec<Fill>,
    /// Parent order ID for bracket legs.
    pub parent_id: Option<String>,
}

impl OrderState {
    /// Total filled quantity across recorded fills.
    #[must_use]
    pub fn filled_quantity(&self) -> Decimal {
        self.fills.iter().map(|f| f.quantity).sum()
    }
}
