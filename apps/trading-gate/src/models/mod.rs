//! Shared data model for the trading gate.

mod operation;
mod order;

pub use operation::{OperationKind, TradingOperation};
pub use order::{Fill, OrderSide, OrderState, OrderStatus, OrderType, TimeInForce};
