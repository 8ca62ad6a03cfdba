//! Simulated broker client.
//!
//! In-memory [`BrokerClient`] implementation that honours the
//! transmit/parent deferral semantics of bracket placement: legs submitted
//! with `transmit = false` are held, and the arrival of the transmitting
//! leg releases the whole linked group. Used by the binary's dry-run
//! wiring and by the test suites; the fill/disconnect hooks drive
//! lifecycle transitions no real broker would produce on demand.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{BrokerClient, BrokerError, BrokerOrderSnapshot, OrderAck, OrderTicket};
use crate::models::OrderStatus;

#[derive(Debug, Clone)]
struct SimOrder {
    snapshot: BrokerOrderSnapshot,
    /// True while the order awaits its group's transmitting leg.
    held: bool,
}

/// Simulated in-memory broker.
#[derive(Debug, Default)]
pub struct SimBroker {
    connected: AtomicBool,
    next_id: AtomicU64,
    connect_failures: AtomicU32,
    place_failure: Mutex<Option<(u32, String)>>,
    orders: Mutex<HashMap<String, SimOrder>>,
}

impl SimBroker {
    /// Create a disconnected simulated broker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            connect_failures: AtomicU32::new(0),
            place_failure: Mutex::new(None),
            orders: Mutex::new(HashMap::new()),
        }
    }

    /// Make the next `n` connect attempts fail.
    pub fn fail_next_connects(&self, n: u32) {
        self.connect_failures.store(n, Ordering::SeqCst);
    }

    /// Reject the placement that arrives after `successes` more
    /// successful placements.
    pub fn fail_place_after(&self, successes: u32, reason: impl Into<String>) {
        *self
            .place_failure
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) =
            Some((successes, reason.into()));
    }

    /// Sever the session without a caller-initiated disconnect.
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Insert an order known only to the broker (reconciliation tests).
    pub fn seed_order(&self, snapshot: BrokerOrderSnapshot) {
        let mut orders = self
            .orders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        orders.insert(
            snapshot.order_id.clone(),
            SimOrder {
                snapshot,
                held: false,
            },
        );
    }

    /// Fully fill an order at the given price, cancelling any linked
    /// sibling leg (one-cancels-other).
    pub fn fill(&self, order_id: &str, price: Decimal) {
        let mut orders = self
            .orders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let parent_id = match orders.get_mut(order_id) {
            Some(order) => {
                order.snapshot.status = OrderStatus::Filled;
                order.snapshot.filled_quantity = order.snapshot.quantity;
                order.snapshot.avg_fill_price = Some(price);
                order.snapshot.parent_id.clone()
            }
            None => return,
        };

        if let Some(parent) = parent_id {
            for sibling in orders.values_mut() {
                if sibling.snapshot.parent_id.as_deref() == Some(parent.as_str())
                    && sibling.snapshot.order_id != order_id
                    && !sibling.snapshot.status.is_terminal()
                {
                    sibling.snapshot.status = OrderStatus::Cancelled;
                }
            }
        }
    }

    /// Partially fill an order.
    pub fn partial_fill(&self, order_id: &str, quantity: Decimal, price: Decimal) {
        let mut orders = self
            .orders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(order) = orders.get_mut(order_id) {
            order.snapshot.status = OrderStatus::PartiallyFilled;
            order.snapshot.filled_quantity += quantity;
            order.snapshot.avg_fill_price = Some(price);
        }
    }

    fn take_place_failure(&self) -> Option<String> {
        let mut slot = self
            .place_failure
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match slot.take() {
            Some((0, reason)) => Some(reason),
            Some((n, reason)) => {
                *slot = Some((n - 1, reason));
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl BrokerClient for SimBroker {
    async fn connect(&self) -> Result<(), BrokerError> {
        if self.connect_failures.load(Ordering::SeqCst) > 0 {
            self.connect_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(BrokerError::Transport {
                message: "simulated connect failure".to_string(),
            });
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn place_order(&self, ticket: OrderTicket) -> Result<OrderAck, BrokerError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BrokerError::NotConnected);
        }
        if ticket.quantity <= Decimal::ZERO {
            return Err(BrokerError::Rejected {
                reason: "quantity must be positive".to_string(),
            });
        }
        if let Some(reason) = self.take_place_failure() {
            return Err(BrokerError::Rejected { reason });
        }

        let order_id = format!("SIM-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let transmit = ticket.transmit;
        let release_root = ticket.parent_id.clone();

        let snapshot = BrokerOrderSnapshot {
            order_id: order_id.clone(),
            symbol: ticket.symbol,
            exchange: ticket.exchange,
            currency: ticket.currency,
            side: ticket.side,
            quantity: ticket.quantity,
            order_type: ticket.order_type,
            limit_price: ticket.limit_price,
            stop_price: ticket.stop_price,
            trail_amount: ticket.trail_amount,
            trail_percent: ticket.trail_percent,
            time_in_force: ticket.time_in_force,
            status: OrderStatus::Submitted,
            filled_quantity: Decimal::ZERO,
            avg_fill_price: None,
            parent_id: ticket.parent_id,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let mut orders = self
            .orders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        orders.insert(
            order_id.clone(),
            SimOrder {
                snapshot,
                held: !transmit,
            },
        );

        // The transmitting leg releases the whole linked group.
        if transmit {
            if let Some(root) = release_root {
                for order in orders.values_mut() {
                    let in_group = order.snapshot.order_id == root
                        || order.snapshot.parent_id.as_deref() == Some(root.as_str());
                    if in_group {
                        order.held = false;
                    }
                }
            }
        }
        drop(orders);

        Ok(OrderAck {
            order_id,
            status: OrderStatus::Submitted,
        })
    }

    async fn modify_order(
        &self,
        order_id: &str,
        ticket: OrderTicket,
    ) -> Result<OrderAck, BrokerError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BrokerError::NotConnected);
        }

        let mut orders = self
            .orders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| BrokerError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;

        if order.snapshot.status.is_terminal() {
            return Err(BrokerError::Rejected {
                reason: format!("order {order_id} is already {}", order.snapshot.status),
            });
        }

        order.snapshot.quantity = ticket.quantity;
        order.snapshot.limit_price = ticket.limit_price;
        order.snapshot.stop_price = ticket.stop_price;
        order.snapshot.trail_amount = ticket.trail_amount;
        order.snapshot.trail_percent = ticket.trail_percent;
        order.snapshot.time_in_force = ticket.time_in_force;
        let status = order.snapshot.status;
        drop(orders);

        Ok(OrderAck {
            order_id: order_id.to_string(),
            status,
        })
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), BrokerError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BrokerError::NotConnected);
        }

        let mut orders = self
            .orders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| BrokerError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;

        if order.snapshot.status.is_terminal() {
            return Err(BrokerError::Rejected {
                reason: format!("order {order_id} is already {}", order.snapshot.status),
            });
        }
        order.snapshot.status = OrderStatus::Cancelled;

        // Cancelling a parent takes its linked children with it.
        for child in orders.values_mut() {
            if child.snapshot.parent_id.as_deref() == Some(order_id)
                && !child.snapshot.status.is_terminal()
            {
                child.snapshot.status = OrderStatus::Cancelled;
            }
        }

        Ok(())
    }

    async fn qualify(
        &self,
        symbol: &str,
        _exchange: &str,
        _currency: &str,
    ) -> Result<(), BrokerError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BrokerError::NotConnected);
        }
        if symbol.trim().is_empty() {
            return Err(BrokerError::Rejected {
                reason: "unknown symbol".to_string(),
            });
        }
        Ok(())
    }

    async fn open_orders(&self) -> Result<Vec<BrokerOrderSnapshot>, BrokerError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BrokerError::NotConnected);
        }
        let orders = self
            .orders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(orders
            .values()
            .filter(|o| !o.snapshot.status.is_terminal())
            .map(|o| o.snapshot.clone())
            .collect())
    }

    async fn order_status(&self, order_id: &str) -> Result<BrokerOrderSnapshot, BrokerError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BrokerError::NotConnected);
        }
        let orders = self
            .orders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        orders
            .get(order_id)
            .map(|o| o.snapshot.clone())
            .ok_or_else(|| BrokerError::OrderNotFound {
                order_id: order_id.to_string(),
            })
    }
}
