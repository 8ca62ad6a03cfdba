//! Trading Gate Binary
//!
//! Wires the safety gate, connection supervisor, order lifecycle manager,
//! and protective-order monitor against the simulated broker and runs
//! until interrupted. The real brokerage transport is an external
//! collaborator; this binary exists for dry runs and operational checks.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin trading-gate
//! ```
//!
//! # Environment Variables
//!
//! - `TRADING_GATE_CONFIG`: YAML config path (default: built-in defaults)
//! - `TRADING_GATE_ACCOUNT`: active account id (default: none)
//! - `TRADING_GATE_OVERRIDE_CODE`: kill-switch override code
//! - `RUST_LOG`: log filter (default: info)

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::info;

use trading_gate::broker::sim::SimBroker;
use trading_gate::{
    AuditLogger, ConnectionSupervisor, EmergencyKillSwitch, OrderLifecycleManager, OrderTable,
    ProtectiveOrderMonitor, SafetyGate, load_config, telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let config_path = std::env::var("TRADING_GATE_CONFIG").ok();
    let config = load_config(config_path.as_deref()).context("loading configuration")?;

    let broker = Arc::new(SimBroker::new());
    let kill_switch = Arc::new(EmergencyKillSwitch::new(
        config.safety.kill_switch_override_code.clone(),
    ));
    let audit = Arc::new(AuditLogger::new(config.safety.audit_capacity));
    let gate = Arc::new(SafetyGate::new(
        config.safety.clone(),
        kill_switch,
        audit.clone(),
    ));
    let supervisor = Arc::new(ConnectionSupervisor::new(
        broker.clone(),
        config.connection.clone(),
    ));
    let table = Arc::new(OrderTable::new());
    let monitor = Arc::new(ProtectiveOrderMonitor::new(
        broker.clone(),
        table.clone(),
        config.monitor.clone(),
    ));

    let mut manager =
        OrderLifecycleManager::new(broker, supervisor.clone(), gate.clone(), table, monitor.clone());
    if let Ok(account) = std::env::var("TRADING_GATE_ACCOUNT") {
        manager = manager.with_account(account);
    }

    supervisor
        .ensure_connected()
        .await
        .context("establishing broker session")?;

    info!(
        session_id = %audit.session_id(),
        state = %supervisor.state(),
        "trading gate ready"
    );

    signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutdown signal received");

    monitor.shutdown().await;
    supervisor.shutdown().await;

    let stats = gate.daily_stats();
    info!(
        orders_today = stats.order_count,
        volume_today = %stats.volume,
        tracked_orders = manager.table().active_count(),
        audit_records = audit.len(),
        "trading gate stopped"
    );

    Ok(())
}
