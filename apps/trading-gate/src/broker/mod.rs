//! Broker client seam.
//!
//! The brokerage wire protocol is owned by an opaque client behind
//! [`BrokerClient`]; this crate only consumes its connect / place /
//! cancel / qualify / query primitives. Order tickets carry `transmit`
//! and `parent_id` so the bracket deferral protocol is expressible at
//! the seam.

pub mod codes;
pub mod sim;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{OrderSide, OrderStatus, OrderType, TimeInForce};

/// Broker-side representation of an order to submit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderTicket {
    /// Instrument symbol.
    pub symbol: String,
    /// Exchange to route to.
    pub exchange: String,
    /// Quote currency.
    pub currency: String,
    /// Order side.
    pub side: OrderSide,
    /// Quantity.
    pub quantity: Decimal,
    /// Order type.
    pub order_type: OrderType,
    /// Limit price (for limit and stop-limit orders).
    pub limit_price: Option<Decimal>,
    /// Stop price (for stop-family orders).
    pub stop_price: Option<Decimal>,
    /// Trailing amount in price units.
    pub trail_amount: Option<Decimal>,
    /// Trailing amount as a percentage.
    pub trail_percent: Option<Decimal>,
    /// Time in force.
    pub time_in_force: TimeInForce,
    /// Whether the broker should activate the order immediately.
    /// Deferred legs of a bracket are submitted with `transmit = false`.
    pub transmit: bool,
    /// Parent order id linking bracket legs to their entry order.
    pub parent_id: Option<String>,
}

impl OrderTicket {
    /// Create a market order ticket.
    #[must_use]
    pub fn market(
        symbol: impl Into<String>,
        exchange: impl Into<String>,
        currency: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            exchange: exchange.into(),
            currency: currency.into(),
            side,
            quantity,
            order_type: OrderType::Market,
            limit_price: None,
            stop_price: None,
            trail_amount: None,
            trail_percent: None,
            time_in_force: TimeInForce::Day,
            transmit: true,
            parent_id: None,
        }
    }

    /// Create a limit order ticket.
    #[must_use]
    pub fn limit(
        symbol: impl Into<String>,
        exchange: impl Into<String>,
        currency: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        limit_price: Decimal,
    ) -> Self {
        Self {
            order_type: OrderType::Limit,
            limit_price: Some(limit_price),
            ..Self::market(symbol, exchange, currency, side, quantity)
        }
    }

    /// Create a stop order ticket.
    #[must_use]
    pub fn stop(
        symbol: impl Into<String>,
        exchange: impl Into<String>,
        currency: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        stop_price: Decimal,
    ) -> Self {
        Self {
            order_type: OrderType::Stop,
            stop_price: Some(stop_price),
            ..Self::market(symbol, exchange, currency, side, quantity)
        }
    }

    /// Set time in force.
    #[must_use]
    pub const fn with_time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = tif;
        self
    }

    /// Defer or allow transmission.
    #[must_use]
    pub const fn with_transmit(mut self, transmit: bool) -> Self {
        self.transmit = transmit;
        self
    }

    /// Link this ticket to a parent order.
    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

/// Acknowledgment returned by the broker on placement or modification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAck {
    /// Broker-assigned order id.
    pub order_id: String,
    /// Status reported at acknowledgement.
    pub status: OrderStatus,
}

/// Broker-reported order state, as returned by the open-orders query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerOrderSnapshot {
    /// Broker-assigned order id.
    pub order_id: String,
    /// Instrument symbol.
    pub symbol: String,
    /// Exchange.
    pub exchange: String,
    /// Quote currency.
    pub currency: String,
    /// Order side.
    pub side: OrderSide,
    /// Quantity.
    pub quantity: Decimal,
    /// Order type.
    pub order_type: OrderType,
    /// Limit price.
    pub limit_price: Option<Decimal>,
    /// Stop price.
    pub stop_price: Option<Decimal>,
    /// Trailing amount.
    pub trail_amount: Option<Decimal>,
    /// Trailing percent.
    pub trail_percent: Option<Decimal>,
    /// Time in force.
    pub time_in_force: TimeInForce,
    /// Broker-reported status.
    pub status: OrderStatus,
    /// Filled quantity so far.
    pub filled_quantity: Decimal,
    /// Average fill price, if any quantity filled.
    pub avg_fill_price: Option<Decimal>,
    /// Parent order id for linked legs.
    pub parent_id: Option<String>,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

/// Broker client errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerError {
    /// No active session.
    #[error("broker session is not connected")]
    NotConnected,

    /// Broker refused the order.
    #[error("rejected: {reason}")]
    Rejected {
        /// Rejection detail from the broker.
        reason: String,
    },

    /// Order id unknown to the broker.
    #[error("order {order_id} unknown to broker")]
    OrderNotFound {
        /// The missing order id.
        order_id: String,
    },

    /// Transport-level failure.
    #[error("transport error: {message}")]
    Transport {
        /// Error details.
        message: String,
    },

    /// Request timed out.
    #[error("broker request timed out")]
    Timeout,
}

/// Opaque broker client consumed by the gate.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Establish the broker session.
    async fn connect(&self) -> Result<(), BrokerError>;

    /// Tear down the broker session.
    async fn disconnect(&self);

    /// Whether a session is currently established.
    async fn is_connected(&self) -> bool;

    /// Submit an order; the ack carries the broker-assigned id.
    async fn place_order(&self, ticket: OrderTicket) -> Result<OrderAck, BrokerError>;

    /// Submit a revision carrying an existing order id.
    async fn modify_order(
        &self,
        order_id: &str,
        ticket: OrderTicket,
    ) -> Result<OrderAck, BrokerError>;

    /// Cancel an order by broker id.
    async fn cancel_order(&self, order_id: &str) -> Result<(), BrokerError>;

    /// Validate an instrument against the broker's reference data.
    async fn qualify(
        &self,
        symbol: &str,
        exchange: &str,
        currency: &str,
    ) -> Result<(), BrokerError>;

    /// All currently open (non-terminal) orders.
    async fn open_orders(&self) -> Result<Vec<BrokerOrderSnapshot>, BrokerError>;

    /// Status of a single order.
    async fn order_status(&self, order_id: &str) -> Result<BrokerOrderSnapshot, BrokerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_ticket_defaults() {
        let ticket = OrderTicket::market("AAPL", "SMART", "USD", OrderSide::Buy, Decimal::new(100, 0));
        assert_eq!(ticket.order_type, OrderType::Market);
        assert!(ticket.transmit);
        assert!(ticket.parent_id.is_none());
        assert_eq!(ticket.time_in_force, TimeInForce::Day);
    }

    #[test]
    fn test_deferred_child_ticket() {
        let ticket = OrderTicket::stop(
            "AAPL",
            "SMART",
            "USD",
            OrderSide::Sell,
            Decimal::new(100, 0),
            Decimal::new(145, 0),
        )
        .with_transmit(false)
        .with_parent("SIM-1");

        assert!(!ticket.transmit);
        assert_eq!(ticket.parent_id.as_deref(), Some("SIM-1"));
        assert_eq!(ticket.stop_price, Some(Decimal::new(145, 0)));
    }
}
