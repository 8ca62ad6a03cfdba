//! Order lifecycle management.
//!
//! Places, modifies, and cancels market, limit, and bracket orders, and
//! reconciles local tracking against the broker's authoritative state.
//! Every mutating operation passes the safety gate before the broker is
//! contacted; read-only status queries bypass it.

mod bracket;
mod table;

pub use bracket::{BracketGroup, BracketSpec};
pub use table::OrderTable;

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::broker::{BrokerClient, BrokerOrderSnapshot, OrderAck, OrderTicket};
use crate::connection::ConnectionSupervisor;
use crate::error::GateError;
use crate::models::{
    Fill, OperationKind, OrderSide, OrderState, OrderStatus, OrderType, TimeInForce,
};
use crate::monitor::ProtectiveOrderMonitor;
use crate::safety::SafetyGate;

/// Partial update for a non-destructive order revision.
///
/// Fields left as `None` inherit the previous revision's values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderUpdate {
    /// New quantity.
    pub quantity: Option<Decimal>,
    /// New limit price.
    pub limit_price: Option<Decimal>,
    /// New stop price.
    pub stop_price: Option<Decimal>,
    /// New time in force.
    pub time_in_force: Option<TimeInForce>,
}

impl OrderUpdate {
    /// True when no field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.quantity.is_none()
            && self.limit_price.is_none()
            && self.stop_price.is_none()
            && self.time_in_force.is_none()
    }
}

/// Result of a successful placement or modification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementReceipt {
    /// Broker-assigned order id.
    pub order_id: String,
    /// Status at acknowledgement.
    pub status: OrderStatus,
    /// Instrument symbol.
    pub symbol: String,
    /// Order side.
    pub side: OrderSide,
    /// Quantity.
    pub quantity: Decimal,
    /// Order type.
    pub order_type: OrderType,
}

/// Result of a successful bracket placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BracketReceipt {
    /// The three linked leg ids.
    pub group: BracketGroup,
    /// Status of the entry leg at acknowledgement.
    pub status: OrderStatus,
}

/// Default exchange for order routing.
const DEFAULT_EXCHANGE: &str = "SMART";
/// Default quote currency.
const DEFAULT_CURRENCY: &str = "USD";

/// Places, revises, cancels, and reconciles orders against the broker.
pub struct OrderLifecycleManager {
    broker: Arc<dyn BrokerClient>,
    supervisor: Arc<ConnectionSupervisor>,
    gate: Arc<SafetyGate>,
    table: Arc<OrderTable>,
    monitor: Arc<ProtectiveOrderMonitor>,
    exchange: String,
    currency: String,
    account: Option<String>,
}

impl OrderLifecycleManager {
    /// Create a manager wired to its collaborators.
    #[must_use]
    pub fn new(
        broker: Arc<dyn BrokerClient>,
        supervisor: Arc<ConnectionSupervisor>,
        gate: Arc<SafetyGate>,
        table: Arc<OrderTable>,
        monitor: Arc<ProtectiveOrderMonitor>,
    ) -> Self {
        Self {
            broker,
            supervisor,
            gate,
            table,
            monitor,
            exchange: DEFAULT_EXCHANGE.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            account: None,
        }
    }

    /// Attach the active account id, included in gate payloads.
    #[must_use]
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// The local order table.
    #[must_use]
    pub fn table(&self) -> &Arc<OrderTable> {
        &self.table
    }

    /// Place a market order.
    ///
    /// # Errors
    ///
    /// `SafetyViolation` when the gate rejects, `ValidationFailure` on bad
    /// parameters, `ConnectionFailure`/`BrokerRejection` from the broker.
    pub async fn place_market(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> Result<PlacementReceipt, GateError> {
        let mut payload = self.base_payload(symbol, side, quantity);
        payload["order_type"] = json!("MARKET");
        self.authorize(OperationKind::OrderPlacement, &payload)?;

        validate_symbol(symbol)?;
        validate_quantity(quantity)?;

        self.supervisor.ensure_connected().await?;
        self.broker
            .qualify(symbol, &self.exchange, &self.currency)
            .await?;

        let ticket = OrderTicket::market(symbol, &self.exchange, &self.currency, side, quantity);
        let ack = self.broker.place_order(ticket.clone()).await?;
        let receipt = self.record_new_order(&ticket, &ack);
        Ok(receipt)
    }

    /// Place a limit order.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::place_market`].
    pub async fn place_limit(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        limit_price: Decimal,
        time_in_force: TimeInForce,
    ) -> Result<PlacementReceipt, GateError> {
        let mut payload = self.base_payload(symbol, side, quantity);
        payload["order_type"] = json!("LIMIT");
        payload["limit_price"] = json!(limit_price);
        self.authorize(OperationKind::OrderPlacement, &payload)?;

        validate_symbol(symbol)?;
        validate_quantity(quantity)?;
        validate_price(limit_price, "limit price")?;

        self.supervisor.ensure_connected().await?;
        self.broker
            .qualify(symbol, &self.exchange, &self.currency)
            .await?;

        let ticket =
            OrderTicket::limit(symbol, &self.exchange, &self.currency, side, quantity, limit_price)
                .with_time_in_force(time_in_force);
        let ack = self.broker.place_order(ticket.clone()).await?;
        let receipt = self.record_new_order(&ticket, &ack);
        Ok(receipt)
    }

    /// Place a bracket order: entry, protective stop, profit target.
    ///
    /// All three legs are prepared before any submission; the parent and
    /// stop legs are submitted with transmission deferred, and the target
    /// leg's submission releases the whole linked group. If a child
    /// submission fails, already placed (untransmitted) legs are
    /// cancelled so no orphaned risk order can exist at the broker.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::place_market`].
    pub async fn place_bracket(&self, spec: &BracketSpec) -> Result<BracketReceipt, GateError> {
        let mut payload = self.base_payload(&spec.symbol, spec.side, spec.quantity);
        payload["limit_price"] = json!(spec.entry_price);
        payload["stop_price"] = json!(spec.stop_price);
        payload["target_price"] = json!(spec.target_price);
        self.authorize(OperationKind::OrderPlacement, &payload)?;

        spec.validate()?;

        self.supervisor.ensure_connected().await?;
        self.broker
            .qualify(&spec.symbol, &self.exchange, &self.currency)
            .await?;

        let entry_ticket = spec.entry_ticket();
        let entry_ack = self.broker.place_order(entry_ticket.clone()).await?;

        let stop_ticket = spec.stop_ticket(&entry_ack.order_id);
        let stop_ack = match self.broker.place_order(stop_ticket.clone()).await {
            Ok(ack) => ack,
            Err(e) => {
                warn!(
                    parent_order_id = %entry_ack.order_id,
                    error = %e,
                    "stop leg failed, cancelling untransmitted entry"
                );
                let _ = self.broker.cancel_order(&entry_ack.order_id).await;
                return Err(e.into());
            }
        };

        let target_ticket = spec.target_ticket(&entry_ack.order_id);
        let target_ack = match self.broker.place_order(target_ticket.clone()).await {
            Ok(ack) => ack,
            Err(e) => {
                warn!(
                    parent_order_id = %entry_ack.order_id,
                    error = %e,
                    "target leg failed, cancelling untransmitted group"
                );
                let _ = self.broker.cancel_order(&stop_ack.order_id).await;
                let _ = self.broker.cancel_order(&entry_ack.order_id).await;
                return Err(e.into());
            }
        };

        let entry = self.record_new_order(&entry_ticket, &entry_ack);
        self.record_new_order(&stop_ticket, &stop_ack);
        self.record_new_order(&target_ticket, &target_ack);

        let group = BracketGroup {
            parent_order_id: entry_ack.order_id,
            stop_order_id: stop_ack.order_id,
            target_order_id: target_ack.order_id,
        };
        self.table.register_bracket(group.clone());

        info!(
            parent_order_id = %group.parent_order_id,
            stop_order_id = %group.stop_order_id,
            target_order_id = %group.target_order_id,
            symbol = %spec.symbol,
            "bracket group placed"
        );

        Ok(BracketReceipt {
            group,
            status: entry.status,
        })
    }

    /// Revise an order non-destructively: unspecified fields inherit the
    /// previous revision's values; the revision keeps the original id.
    ///
    /// # Errors
    ///
    /// `OrderNotFound` for untracked ids, `ValidationFailure` for
    /// terminal orders or bad merged parameters, plus broker failures.
    pub async fn modify(
        &self,
        order_id: &str,
        update: OrderUpdate,
    ) -> Result<PlacementReceipt, GateError> {
        let mut payload = json!({ "order_id": order_id });
        if let Some(q) = update.quantity {
            payload["quantity"] = json!(q);
        }
        if let Some(p) = update.limit_price {
            payload["limit_price"] = json!(p);
        }
        if let Some(p) = update.stop_price {
            payload["stop_price"] = json!(p);
        }
        if let Some(a) = &self.account {
            payload["account"] = json!(a);
        }
        self.authorize(OperationKind::OrderModification, &payload)?;

        let existing = self
            .table
            .get(order_id)
            .ok_or_else(|| GateError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;
        if existing.status.is_terminal() {
            return Err(GateError::validation(format!(
                "order {order_id} is {} and cannot be modified",
                existing.status
            )));
        }

        let mut revised = existing.clone();
        if let Some(q) = update.quantity {
            revised.quantity = q;
        }
        if let Some(p) = update.limit_price {
            revised.limit_price = Some(p);
        }
        if let Some(p) = update.stop_price {
            revised.stop_price = Some(p);
        }
        if let Some(tif) = update.time_in_force {
            revised.time_in_force = tif;
        }

        validate_quantity(revised.quantity)?;
        if let Some(p) = revised.limit_price {
            validate_price(p, "limit price")?;
        }
        if let Some(p) = revised.stop_price {
            validate_price(p, "stop price")?;
        }

        self.supervisor.ensure_connected().await?;

        let ticket = OrderTicket {
            symbol: revised.symbol.clone(),
            exchange: revised.exchange.clone(),
            currency: revised.currency.clone(),
            side: revised.side,
            quantity: revised.quantity,
            order_type: revised.order_type,
            limit_price: revised.limit_price,
            stop_price: revised.stop_price,
            trail_amount: revised.trail_amount,
            trail_percent: revised.trail_percent,
            time_in_force: revised.time_in_force,
            transmit: true,
            parent_id: revised.parent_id.clone(),
        };
        self.broker.modify_order(order_id, ticket).await?;

        revised.status = OrderStatus::Modified;
        revised.last_update_at = chrono::Utc::now().to_rfc3339();
        self.table.update(revised.clone());

        info!(order_id = %order_id, "order revised");

        Ok(PlacementReceipt {
            order_id: order_id.to_string(),
            status: revised.status,
            symbol: revised.symbol,
            side: revised.side,
            quantity: revised.quantity,
            order_type: revised.order_type,
        })
    }

    /// Cancel an order, searching the broker's open orders when the id is
    /// not tracked locally.
    ///
    /// # Errors
    ///
    /// `OrderNotFound` when the id is unknown both locally and at the
    /// broker, plus gate and broker failures.
    pub async fn cancel(&self, order_id: &str) -> Result<(), GateError> {
        let mut payload = json!({ "order_id": order_id });
        if let Some(a) = &self.account {
            payload["account"] = json!(a);
        }
        self.authorize(OperationKind::OrderCancellation, &payload)?;

        self.supervisor.ensure_connected().await?;

        if self.table.get(order_id).is_none() {
            let open = self.broker.open_orders().await?;
            if !open.iter().any(|o| o.order_id == order_id) {
                return Err(GateError::OrderNotFound {
                    order_id: order_id.to_string(),
                });
            }
        }

        self.broker.cancel_order(order_id).await?;
        self.table
            .record_status(order_id, OrderStatus::Cancelled, None);

        info!(order_id = %order_id, "order cancelled");
        Ok(())
    }

    /// Current state of an order: local tracking first, then the broker's
    /// open-order list, adapted into the same shape so callers cannot
    /// distinguish the two sources. Read-only; bypasses the gate.
    ///
    /// # Errors
    ///
    /// `OrderNotFound` when neither source knows the id.
    pub async fn get_status(&self, order_id: &str) -> Result<OrderState, GateError> {
        if let Some(order) = self.table.get(order_id) {
            return Ok(order);
        }

        self.supervisor.ensure_connected().await?;
        let open = self.broker.open_orders().await?;
        open.into_iter()
            .find(|o| o.order_id == order_id)
            .map(adapt_snapshot)
            .ok_or_else(|| GateError::OrderNotFound {
                order_id: order_id.to_string(),
            })
    }

    fn authorize(&self, kind: OperationKind, payload: &Value) -> Result<(), GateError> {
        let verdict = self.gate.validate_trading_operation(kind, payload);
        if verdict.is_safe {
            Ok(())
        } else {
            Err(GateError::SafetyViolation {
                reasons: verdict.errors,
            })
        }
    }

    fn base_payload(&self, symbol: &str, side: OrderSide, quantity: Decimal) -> Value {
        let mut payload = json!({
            "symbol": symbol,
            "side": side.to_string(),
            "quantity": quantity,
        });
        if let Some(a) = &self.account {
            payload["account"] = json!(a);
        }
        payload
    }

    /// Record a broker-acknowledged order locally and hand protective
    /// legs to the monitor.
    fn record_new_order(&self, ticket: &OrderTicket, ack: &OrderAck) -> PlacementReceipt {
        let now = chrono::Utc::now().to_rfc3339();
        let order = OrderState {
            order_id: ack.order_id.clone(),
            symbol: ticket.symbol.clone(),
            exchange: ticket.exchange.clone(),
            currency: ticket.currency.clone(),
            side: ticket.side,
            quantity: ticket.quantity,
            order_type: ticket.order_type,
            limit_price: ticket.limit_price,
            stop_price: ticket.stop_price,
            trail_amount: ticket.trail_amount,
            trail_percent: ticket.trail_percent,
            time_in_force: ticket.time_in_force,
            status: ack.status,
            created_at: now.clone(),
            last_update_at: now,
            fills: Vec::new(),
            parent_id: ticket.parent_id.clone(),
        };
        self.table.insert(order);

        info!(
            order_id = %ack.order_id,
            symbol = %ticket.symbol,
            side = %ticket.side,
            quantity = %ticket.quantity,
            order_type = ?ticket.order_type,
            "order placed"
        );

        if ticket.order_type.is_protective() {
            self.monitor.track(&ack.order_id, ack.status);
        }

        PlacementReceipt {
            order_id: ack.order_id.clone(),
            status: ack.status,
            symbol: ticket.symbol.clone(),
            side: ticket.side,
            quantity: ticket.quantity,
            order_type: ticket.order_type,
        }
    }
}

impl std::fmt::Debug for OrderLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderLifecycleManager")
            .field("exchange", &self.exchange)
            .field("currency", &self.currency)
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

/// Adapt a broker snapshot into the local order shape.
fn adapt_snapshot(snapshot: BrokerOrderSnapshot) -> OrderState {
    let fills = if snapshot.filled_quantity > Decimal::ZERO {
        vec![Fill {
            price: snapshot.avg_fill_price.unwrap_or(Decimal::ZERO),
            quantity: snapshot.filled_quantity,
            timestamp: snapshot.created_at.clone(),
        }]
    } else {
        Vec::new()
    };

    OrderState {
        order_id: snapshot.order_id,
        symbol: snapshot.symbol,
        exchange: snapshot.exchange,
        currency: snapshot.currency,
        side: snapshot.side,
        quantity: snapshot.quantity,
        order_type: snapshot.order_type,
        limit_price: snapshot.limit_price,
        stop_price: snapshot.stop_price,
        trail_amount: snapshot.trail_amount,
        trail_percent: snapshot.trail_percent,
        time_in_force: snapshot.time_in_force,
        status: snapshot.status,
        created_at: snapshot.created_at.clone(),
        last_update_at: snapshot.created_at,
        fills,
        parent_id: snapshot.parent_id,
    }
}

fn validate_symbol(symbol: &str) -> Result<(), GateError> {
    if symbol.trim().is_empty() {
        return Err(GateError::validation("symbol must not be empty"));
    }
    Ok(())
}

fn validate_quantity(quantity: Decimal) -> Result<(), GateError> {
    if quantity <= Decimal::ZERO {
        return Err(GateError::validation("quantity must be positive"));
    }
    Ok(())
}

fn validate_price(price: Decimal, name: &str) -> Result<(), GateError> {
    if price <= Decimal::ZERO {
        return Err(GateError::validation(format!("{name} must be positive")));
    }
    Ok(())
}
