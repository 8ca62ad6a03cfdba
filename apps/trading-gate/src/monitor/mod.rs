//! Background status polling for protective (stop-family) orders.
//!
//! A single loop, started lazily when the first protective order is
//! tracked and stopped once none remain, polls each tracked order's
//! broker status at a fixed interval. Detected changes are appended to a
//! transition log and applied to the local order table. Terminal orders
//! are kept queryable for a retention period before cleanup, so a caller
//! can still ask "what just happened" shortly afterwards.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broker::BrokerClient;
use crate::config::MonitorConfig;
use crate::models::OrderStatus;
use crate::orders::OrderTable;

/// A recorded status change on a tracked order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTransition {
    /// The order that changed.
    pub order_id: String,
    /// Status before the change.
    pub old: OrderStatus,
    /// Status after the change.
    pub new: OrderStatus,
    /// When the change was observed.
    pub at: DateTime<Utc>,
}

/// Snapshot of the monitor loop for introspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorStatus {
    /// Whether the polling loop is running.
    pub running: bool,
    /// Orders currently tracked (including retained terminal ones).
    pub tracked: usize,
    /// Transitions recorded so far.
    pub transitions_recorded: usize,
}

#[derive(Debug)]
struct TrackedOrder {
    last_status: OrderStatus,
    /// Set on a terminal transition; the entry is dropped once this
    /// deadline passes.
    retire_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct MonitorInner {
    tracked: HashMap<String, TrackedOrder>,
    transitions: VecDeque<StatusTransition>,
}

/// Polls tracked protective orders and records their transitions.
pub struct ProtectiveOrderMonitor {
    broker: Arc<dyn BrokerClient>,
    table: Arc<OrderTable>,
    config: MonitorConfig,
    inner: Mutex<MonitorInner>,
    task: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl ProtectiveOrderMonitor {
    /// Create a monitor over the given broker and order table.
    #[must_use]
    pub fn new(broker: Arc<dyn BrokerClient>, table: Arc<OrderTable>, config: MonitorConfig) -> Self {
        Self {
            broker,
            table,
            config,
            inner: Mutex::new(MonitorInner::default()),
            task: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    /// Track a protective order, starting the polling loop if it is not
    /// already running.
    pub fn track(self: &Arc<Self>, order_id: &str, status: OrderStatus) {
        {
            let mut inner = self
                .inner
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            inner.tracked.insert(
                order_id.to_string(),
                TrackedOrder {
                    last_status: status,
                    retire_at: None,
                },
            );
        }
        debug!(order_id = %order_id, "tracking protective order");
        self.ensure_running();
    }

    /// Whether an order is currently tracked.
    #[must_use]
    pub fn is_tracking(&self, order_id: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .tracked
            .contains_key(order_id)
    }

    /// Monitor loop status.
    #[must_use]
    pub fn status(&self) -> MonitorStatus {
        let inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        MonitorStatus {
            running: self.loop_running(),
            tracked: inner.tracked.len(),
            transitions_recorded: inner.transitions.len(),
        }
    }

    /// Transitions recorded for one order, oldest first.
    #[must_use]
    pub fn transitions_for(&self, order_id: &str) -> Vec<StatusTransition> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .transitions
            .iter()
            .filter(|t| t.order_id == order_id)
            .cloned()
            .collect()
    }

    /// Stop the loop and discard tracking state.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let task = self
            .task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    fn loop_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Idempotent presence check: at most one polling loop exists.
    fn ensure_running(self: &Arc<Self>) {
        let mut slot = self
            .task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let monitor = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            monitor.run_loop().await;
        }));
    }

    async fn run_loop(&self) {
        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            "protective order monitor started"
        );
        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            // Snapshot under the lock, poll outside it.
            let due: Vec<(String, OrderStatus)> = {
                let mut inner = self
                    .inner
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);

                let now = Instant::now();
                inner
                    .tracked
                    .retain(|_, t| t.retire_at.is_none_or(|deadline| deadline > now));

                if inner.tracked.is_empty() {
                    break;
                }

                inner
                    .tracked
                    .iter()
                    .filter(|(_, t)| t.retire_at.is_none())
                    .map(|(id, t)| (id.clone(), t.last_status))
                    .collect()
            };

            for (order_id, last_status) in due {
                match self.broker.order_status(&order_id).await {
                    Ok(snapshot) => {
                        if snapshot.status != last_status {
                            self.apply_transition(&order_id, last_status, snapshot.status);
                        }
                    }
                    Err(e) => {
                        // Poll failures are logged and retried next tick.
                        warn!(order_id = %order_id, error = %e, "protective order poll failed");
                    }
                }
            }
        }

        info!("protective order monitor stopped");
    }

    /// Record a detected change; a fully completed mutation before the
    /// next suspension point.
    fn apply_transition(&self, order_id: &str, old: OrderStatus, new: OrderStatus) {
        info!(
            order_id = %order_id,
            old = %old,
            new = %new,
            "protective order status changed"
        );

        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        inner.transitions.push_back(StatusTransition {
            order_id: order_id.to_string(),
            old,
            new,
            at: Utc::now(),
        });
        while inner.transitions.len() > self.config.max_transitions {
            inner.transitions.pop_front();
        }

        if let Some(tracked) = inner.tracked.get_mut(order_id) {
            tracked.last_status = new;
            if new.is_terminal() {
                // Retained for late queries, then cleaned up.
                tracked.retire_at = Some(Instant::now() + self.config.retention());
            }
        }
        drop(inner);

        self.table.record_status(order_id, new, None);
    }
}

impl std::fmt::Debug for ProtectiveOrderMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtectiveOrderMonitor")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
