//! Local order and bracket-group tracking.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use super::bracket::BracketGroup;
use crate::models::{Fill, OrderState, OrderStatus};

/// How many terminal orders stay queryable before eviction.
const COMPLETED_CAP: usize = 256;

#[derive(Debug, Default)]
struct TableInner {
    /// Working orders, keyed by broker-assigned id.
    active: HashMap<String, OrderState>,
    /// Terminal orders retained for late status queries.
    completed: HashMap<String, OrderState>,
    /// Completion order, for bounded eviction.
    completed_order: VecDeque<String>,
    /// Bracket groups with at least one non-terminal leg.
    brackets: Vec<BracketGroup>,
}

/// Process-wide order table.
///
/// Orders move from the active set to a bounded completed set on a
/// terminal status rather than being deleted, so callers can still ask
/// "what just happened". Every mutation completes under one lock.
#[derive(Debug, Default)]
pub struct OrderTable {
    inner: RwLock<TableInner>,
}

impl OrderTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly acknowledged order.
    pub fn insert(&self, order: OrderState) {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.active.insert(order.order_id.clone(), order);
    }

    /// Look up an order in the active set, then the completed set.
    #[must_use]
    pub fn get(&self, order_id: &str) -> Option<OrderState> {
        let inner = self
            .inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner
            .active
            .get(order_id)
            .or_else(|| inner.completed.get(order_id))
            .cloned()
    }

    /// Replace an active order with a new revision (same id).
    pub fn update(&self, order: OrderState) {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if inner.active.contains_key(&order.order_id) {
            inner.active.insert(order.order_id.clone(), order);
        }
    }

    /// Apply a polled status to an order, moving it to the completed set
    /// on a terminal transition and pruning finished bracket groups.
    pub fn record_status(&self, order_id: &str, status: OrderStatus, fill: Option<Fill>) {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let Some(mut order) = inner.active.remove(order_id) else {
            return;
        };

        order.status = status;
        order.last_update_at = chrono::Utc::now().to_rfc3339();
        if let Some(fill) = fill {
            order.fills.push(fill);
        }

        if status.is_terminal() {
            inner.completed_order.push_back(order_id.to_string());
            inner.completed.insert(order_id.to_string(), order);
            while inner.completed_order.len() > COMPLETED_CAP {
                if let Some(evicted) = inner.completed_order.pop_front() {
                    inner.completed.remove(&evicted);
                }
            }
            Self::prune_brackets(&mut inner);
        } else {
            inner.active.insert(order_id.to_string(), order);
        }
    }

    /// All working orders.
    #[must_use]
    pub fn active_orders(&self) -> Vec<OrderState> {
        let inner = self
            .inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.active.values().cloned().collect()
    }

    /// Count of working orders.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .active
            .len()
    }

    /// Count of retained terminal orders.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .completed
            .len()
    }

    /// Register a newly placed bracket group.
    pub fn register_bracket(&self, group: BracketGroup) {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.brackets.push(group);
    }

    /// The bracket group an order belongs to, if any.
    #[must_use]
    pub fn bracket_for(&self, order_id: &str) -> Option<BracketGroup> {
        let inner = self
            .inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner
            .brackets
            .iter()
            .find(|g| g.contains(order_id))
            .cloned()
    }

    /// Number of live bracket groups.
    #[must_use]
    pub fn bracket_count(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .brackets
            .len()
    }

    /// Drop bracket groups whose legs have all reached a terminal state.
    fn prune_brackets(inner: &mut TableInner) {
        let active = &inner.active;
        inner
            .brackets
            .retain(|g| g.leg_ids().iter().any(|id| active.contains_key(*id)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderSide, OrderType, TimeInForce};
    use rust_decimal::Decimal;

    fn make_order(order_id: &str, parent_id: Option<&str>) -> OrderState {
        let now = chrono::Utc::now().to_rfc3339();
        OrderState {
            order_id: order_id.to_string(),
            symbol: "AAPL".to_string(),
            exchange: "SMART".to_string(),
            currency: "USD".to_string(),
            side: OrderSide::Buy,
            quantity: Decimal::new(100, 0),
            order_type: OrderType::Limit,
            limit_price: Some(Decimal::new(150, 0)),
            stop_price: None,
            trail_amount: None,
            trail_percent: None,
            time_in_force: TimeInForce::Day,
            status: OrderStatus::Submitted,
            created_at: now.clone(),
            last_update_at: now,
            fills: vec![],
            parent_id: parent_id.map(ToString::to_string),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let table = OrderTable::new();
        table.insert(make_order("SIM-1", None));

        let order = table.get("SIM-1").unwrap();
        assert_eq!(order.symbol, "AAPL");
        assert_eq!(table.active_count(), 1);
    }

    #[test]
    fn test_terminal_status_moves_to_completed() {
        let table = OrderTable::new();
        table.insert(make_order("SIM-1", None));

        let fill = Fill {
            price: Decimal::new(150, 0),
            quantity: Decimal::new(100, 0),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        table.record_status("SIM-1", OrderStatus::Filled, Some(fill));

        assert_eq!(table.active_count(), 0);
        assert_eq!(table.completed_count(), 1);
        // Still queryable after completion
        let order = table.get("SIM-1").unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.fills.len(), 1);
    }

    #[test]
    fn test_non_terminal_status_stays_active() {
        let table = OrderTable::new();
        table.insert(make_order("SIM-1", None));

        table.record_status("SIM-1", OrderStatus::PartiallyFilled, None);
        assert_eq!(table.active_count(), 1);
        assert_eq!(
            table.get("SIM-1").unwrap().status,
            OrderStatus::PartiallyFilled
        );
    }

    #[test]
    fn test_bracket_group_pruned_when_all_legs_terminal() {
        let table = OrderTable::new();
        table.insert(make_order("SIM-1", None));
        table.insert(make_order("SIM-2", Some("SIM-1")));
        table.insert(make_order("SIM-3", Some("SIM-1")));
        table.register_bracket(BracketGroup {
            parent_order_id: "SIM-1".to_string(),
            stop_order_id: "SIM-2".to_string(),
            target_order_id: "SIM-3".to_string(),
        });

        table.record_status("SIM-1", OrderStatus::Filled, None);
        table.record_status("SIM-2", OrderStatus::Cancelled, None);
        assert_eq!(table.bracket_count(), 1);

        table.record_status("SIM-3", OrderStatus::Filled, None);
        assert_eq!(table.bracket_count(), 0);
    }

    #[test]
    fn test_completed_set_is_bounded() {
        let table = OrderTable::new();
        for i in 0..300 {
            let id = format!("SIM-{i}");
            table.insert(make_order(&id, None));
            table.record_status(&id, OrderStatus::Filled, None);
        }
        assert_eq!(table.completed_count(), COMPLETED_CAP);
        // Oldest entries were evicted
        assert!(table.get("SIM-0").is_none());
        assert!(table.get("SIM-299").is_some());
    }
}
