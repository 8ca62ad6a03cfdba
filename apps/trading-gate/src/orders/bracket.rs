//! Bracket order types and ticket construction.
//!
//! A bracket is a linked group of three orders - entry, protective stop,
//! profit target - submitted atomically with one-cancels-other semantics
//! between the two exit legs. All three tickets are built before any
//! submission; transmission is deferred until the target leg releases the
//! whole group, so the broker never activates a protective leg without
//! its parent already existing as a linked group.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::broker::OrderTicket;
use crate::error::GateError;
use crate::models::{OrderSide, TimeInForce};

/// A validated bracket order request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BracketSpec {
    /// Instrument symbol.
    pub symbol: String,
    /// Exchange to route to.
    pub exchange: String,
    /// Quote currency.
    pub currency: String,
    /// Entry side; exit legs take the opposite side.
    pub side: OrderSide,
    /// Quantity shared by all three legs.
    pub quantity: Decimal,
    /// Entry limit price.
    pub entry_price: Decimal,
    /// Protective stop price.
    pub stop_price: Decimal,
    /// Profit target price.
    pub target_price: Decimal,
    /// Time in force for all legs.
    pub time_in_force: TimeInForce,
}

impl BracketSpec {
    /// Validate internal consistency.
    ///
    /// # Errors
    ///
    /// Returns `GateError::ValidationFailure` on a non-positive quantity
    /// or price, or when the stop/target do not straddle the entry on the
    /// protective side.
    pub fn validate(&self) -> Result<(), GateError> {
        if self.symbol.trim().is_empty() {
            return Err(GateError::validation("symbol must not be empty"));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(GateError::validation("quantity must be positive"));
        }
        if self.entry_price <= Decimal::ZERO
            || self.stop_price <= Decimal::ZERO
            || self.target_price <= Decimal::ZERO
        {
            return Err(GateError::validation("prices must be positive"));
        }

        match self.side {
            OrderSide::Buy => {
                if self.stop_price >= self.entry_price {
                    return Err(GateError::validation(
                        "stop price must be below entry for a BUY bracket",
                    ));
                }
                if self.target_price <= self.entry_price {
                    return Err(GateError::validation(
                        "target price must be above entry for a BUY bracket",
                    ));
                }
            }
            OrderSide::Sell => {
                if self.stop_price <= self.entry_price {
                    return Err(GateError::validation(
                        "stop price must be above entry for a SELL bracket",
                    ));
                }
                if self.target_price >= self.entry_price {
                    return Err(GateError::validation(
                        "target price must be below entry for a SELL bracket",
                    ));
                }
            }
        }

        Ok(())
    }

    /// Entry leg ticket; transmission deferred until the children attach.
    #[must_use]
    pub fn entry_ticket(&self) -> OrderTicket {
        OrderTicket::limit(
            self.symbol.clone(),
            self.exchange.clone(),
            self.currency.clone(),
            self.side,
            self.quantity,
            self.entry_price,
        )
        .with_time_in_force(self.time_in_force)
        .with_transmit(false)
    }

    /// Protective stop leg; opposite side, parent's quantity, deferred.
    #[must_use]
    pub fn stop_ticket(&self, parent_id: &str) -> OrderTicket {
        OrderTicket::stop(
            self.symbol.clone(),
            self.exchange.clone(),
            self.currency.clone(),
            self.side.opposite(),
            self.quantity,
            self.stop_price,
        )
        .with_time_in_force(self.time_in_force)
        .with_transmit(false)
        .with_parent(parent_id)
    }

    /// Profit target leg; opposite side, parent's quantity. Its
    /// submission transmits the whole group.
    #[must_use]
    pub fn target_ticket(&self, parent_id: &str) -> OrderTicket {
        OrderTicket::limit(
            self.symbol.clone(),
            self.exchange.clone(),
            self.currency.clone(),
            self.side.opposite(),
            self.quantity,
            self.target_price,
        )
        .with_time_in_force(self.time_in_force)
        .with_transmit(true)
        .with_parent(parent_id)
    }
}

/// The broker-assigned ids of a placed bracket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketGroup {
    /// Entry order id.
    pub parent_order_id: String,
    /// Protective stop leg id.
    pub stop_order_id: String,
    /// Profit target leg id.
    pub target_order_id: String,
}

impl BracketGroup {
    /// Whether the given order id is one of the three legs.
    #[must_use]
    pub fn contains(&self, order_id: &str) -> bool {
        self.parent_order_id == order_id
            || self.stop_order_id == order_id
            || self.target_order_id == order_id
    }

    /// All three leg ids.
    #[must_use]
    pub fn leg_ids(&self) -> [&str; 3] {
        [
            self.parent_order_id.as_str(),
            self.stop_order_id.as_str(),
            self.target_order_id.as_str(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buy_spec() -> BracketSpec {
        BracketSpec {
            symbol: "AAPL".to_string(),
            exchange: "SMART".to_string(),
            currency: "USD".to_string(),
            side: OrderSide::Buy,
            quantity: Decimal::new(100, 0),
            entry_price: Decimal::new(150, 0),
            stop_price: Decimal::new(145, 0),
            target_price: Decimal::new(160, 0),
            time_in_force: TimeInForce::Day,
        }
    }

    #[test]
    fn test_buy_spec_validates() {
        assert!(buy_spec().validate().is_ok());
    }

    #[test]
    fn test_inverted_stop_rejected() {
        let spec = BracketSpec {
            stop_price: Decimal::new(155, 0),
            ..buy_spec()
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_sell_bracket_price_ordering() {
        let spec = BracketSpec {
            side: OrderSide::Sell,
            stop_price: Decimal::new(155, 0),
            target_price: Decimal::new(140, 0),
            ..buy_spec()
        };
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_exit_legs_oppose_parent_and_share_quantity() {
        let spec = buy_spec();
        let stop = spec.stop_ticket("SIM-1");
        let target = spec.target_ticket("SIM-1");

        assert_eq!(stop.side, OrderSide::Sell);
        assert_eq!(target.side, OrderSide::Sell);
        assert_eq!(stop.quantity, spec.quantity);
        assert_eq!(target.quantity, spec.quantity);
    }

    #[test]
    fn test_transmit_deferral_protocol() {
        let spec = buy_spec();
        assert!(!spec.entry_ticket().transmit);
        assert!(!spec.stop_ticket("SIM-1").transmit);
        // Only the target leg transmits, releasing the group
        assert!(spec.target_ticket("SIM-1").transmit);
    }

    #[test]
    fn test_group_membership() {
        let group = BracketGroup {
            parent_order_id: "SIM-1".to_string(),
            stop_order_id: "SIM-2".to_string(),
            target_order_id: "SIM-3".to_string(),
        };
        assert!(group.contains("SIM-2"));
        assert!(!group.contains("SIM-4"));
    }
}
