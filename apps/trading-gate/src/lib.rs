// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Trading Gate - Rust Core Library
//!
//! Gates and tracks mutating trading actions issued against a brokerage
//! account through an automated/tool-driven interface.
//!
//! # Components
//!
//! - **safety**: the [`safety::SafetyGate`] orchestrating kill switch,
//!   rate limiting, daily ceilings, account policy, and feature flags,
//!   with an append-only [`safety::AuditLogger`]
//! - **connection**: [`connection::ConnectionSupervisor`] owning the
//!   broker session lifecycle and reconnection
//! - **orders**: [`orders::OrderLifecycleManager`] placing, revising,
//!   cancelling, and reconciling orders (including bracket groups)
//! - **monitor**: [`monitor::ProtectiveOrderMonitor`] polling stop-family
//!   orders in the background
//! - **broker**: the opaque [`broker::BrokerClient`] seam plus a
//!   simulated implementation for tests and dry runs
//!
//! The brokerage wire protocol, the outer tool-invocation/RPC layer, and
//! symbol/currency lookup are external collaborators.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Broker client seam and simulated implementation.
pub mod broker;

/// Configuration loading and sections.
pub mod config;

/// Broker session supervision and reconnection.
pub mod connection;

/// Error taxonomy.
pub mod error;

/// Shared data model.
pub mod models;

/// Protective-order background monitoring.
pub mod monitor;

/// Order lifecycle management and local tracking.
pub mod orders;

/// Safety gate and its subcomponents.
pub mod safety;

/// Tracing setup.
pub mod telemetry;

pub use broker::{BrokerClient, BrokerError, BrokerOrderSnapshot, OrderAck, OrderTicket};
pub use config::{Config, ConfigError, load_config};
pub use connection::{ConnectionState, ConnectionSupervisor, ReconnectPolicy};
pub use error::GateError;
pub use models::{
    Fill, OperationKind, OrderSide, OrderState, OrderStatus, OrderType, TimeInForce,
    TradingOperation,
};
pub use monitor::{MonitorStatus, ProtectiveOrderMonitor, StatusTransition};
pub use orders::{
    BracketGroup, BracketReceipt, BracketSpec, OrderLifecycleManager, OrderTable, OrderUpdate,
    PlacementReceipt,
};
pub use safety::{
    ActivationReceipt, ActivationStatus, AuditLogger, AuditRecord, DailyLimitsTracker, DailyStats,
    DeactivationStatus, EmergencyKillSwitch, RateLimiter, SafetyGate, SafetyVerdict,
};
