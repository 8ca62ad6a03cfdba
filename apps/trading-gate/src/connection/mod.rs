//! Broker session supervision.
//!
//! Owns the session lifecycle and reconnection:
//!
//! ```text
//! DISCONNECTED → CONNECTING → CONNECTED
//! CONNECTED → (unsolicited drop) → DISCONNECTED → RECONNECTING → CONNECTED|DISCONNECTED
//! ```
//!
//! `ensure_connected` returns immediately when a session exists; while an
//! attempt is in flight, further callers await its completion instead of
//! starting a duplicate. An unsolicited disconnect notification schedules
//! at most one background reconnect task, cancellable on shutdown.

mod backoff;

pub use backoff::ReconnectPolicy;

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broker::{BrokerClient, codes};
use crate::config::ConnectionConfig;
use crate::error::GateError;

/// Broker session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session and no attempt in flight.
    Disconnected,
    /// Initial establishment in progress.
    Connecting,
    /// Session established.
    Connected,
    /// Background re-establishment after an unsolicited drop.
    Reconnecting,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "DISCONNECTED"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Connected => write!(f, "CONNECTED"),
            Self::Reconnecting => write!(f, "RECONNECTING"),
        }
    }
}

/// Supervises the broker session: establishment, reconnection, and
/// advisory classification.
pub struct ConnectionSupervisor {
    broker: Arc<dyn BrokerClient>,
    config: ConnectionConfig,
    state: Mutex<ConnectionState>,
    /// Serialises establishment attempts; waiters on the lock are exactly
    /// the callers awaiting an in-flight attempt.
    attempt_gate: tokio::sync::Mutex<()>,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl ConnectionSupervisor {
    /// Create a supervisor over the given broker client.
    #[must_use]
    pub fn new(broker: Arc<dyn BrokerClient>, config: ConnectionConfig) -> Self {
        Self {
            broker,
            config,
            state: Mutex::new(ConnectionState::Disconnected),
            attempt_gate: tokio::sync::Mutex::new(()),
            reconnect_task: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if *state != next {
            debug!(from = %*state, to = %next, "connection state transition");
            *state = next;
        }
    }

    /// Ensure a broker session exists, establishing one if necessary.
    ///
    /// Returns immediately when already connected. When an attempt is in
    /// flight, awaits its completion instead of starting a duplicate.
    ///
    /// # Errors
    ///
    /// Returns `GateError::ConnectionFailure` once the bounded attempt
    /// budget is exhausted or the supervisor is shutting down.
    pub async fn ensure_connected(&self) -> Result<(), GateError> {
        if self.broker.is_connected().await {
            self.set_state(ConnectionState::Connected);
            return Ok(());
        }
        self.establish(ConnectionState::Connecting).await
    }

    async fn establish(&self, mode: ConnectionState) -> Result<(), GateError> {
        let _permit = self.attempt_gate.lock().await;

        // An earlier holder of the gate may have connected while we waited.
        if self.broker.is_connected().await {
            self.set_state(ConnectionState::Connected);
            return Ok(());
        }

        self.set_state(mode);
        let mut policy = ReconnectPolicy::new(&self.config);

        loop {
            match self.broker.connect().await {
                Ok(()) => {
                    self.set_state(ConnectionState::Connected);
                    info!(attempts = policy.current_attempt() + 1, "broker session established");
                    return Ok(());
                }
                Err(e) => match policy.next_backoff() {
                    Some(delay) => {
                        warn!(
                            attempt = policy.current_attempt(),
                            max_attempts = policy.max_attempts(),
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            error = %e,
                            "broker connect failed, backing off"
                        );
                        tokio::select! {
                            () = self.shutdown.cancelled() => {
                                self.set_state(ConnectionState::Disconnected);
                                return Err(GateError::ConnectionFailure {
                                    message: "connection attempt cancelled by shutdown".to_string(),
                                });
                            }
                            () = tokio::time::sleep(delay) => {}
                        }
                    }
                    None => {
                        self.set_state(ConnectionState::Disconnected);
                        error!(
                            attempts = policy.max_attempts(),
                            error = %e,
                            "broker connection failed, giving up"
                        );
                        return Err(GateError::ConnectionFailure {
                            message: format!(
                                "giving up after {} attempts: {e}",
                                policy.max_attempts()
                            ),
                        });
                    }
                },
            }
        }
    }

    /// React to an unsolicited disconnect reported by the transport.
    ///
    /// Schedules exactly one background reconnect task; repeated
    /// notifications while one is running are no-ops.
    pub fn notify_unsolicited_disconnect(self: &Arc<Self>) {
        self.set_state(ConnectionState::Disconnected);

        let mut slot = self
            .reconnect_task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            debug!("reconnect task already scheduled");
            return;
        }

        warn!("unsolicited disconnect, scheduling background reconnect");
        let supervisor = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            let result = tokio::select! {
                () = supervisor.shutdown.cancelled() => return,
                result = supervisor.establish(ConnectionState::Reconnecting) => result,
            };
            // Background task: log and terminate, never propagate.
            if let Err(e) = result {
                error!(error = %e, "background reconnect gave up");
            }
        }));
    }

    /// Whether a background reconnect task is currently running.
    #[must_use]
    pub fn reconnect_in_progress(&self) -> bool {
        self.reconnect_task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Classify and log a broker advisory received over the session.
    pub fn handle_broker_advisory(&self, code: i32, message: &str) {
        codes::log_advisory(code, message);
    }

    /// Cancel background work and tear down the session.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let task = self
            .reconnect_task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }
        self.broker.disconnect().await;
        self.set_state(ConnectionState::Disconnected);
    }
}

impl std::fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::sim::SimBroker;
    use std::time::Duration;

    fn fast_config(max_attempts: u32) -> ConnectionConfig {
        ConnectionConfig {
            max_attempts,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            backoff_multiplier: 2.0,
        }
    }

    fn make_supervisor(max_attempts: u32) -> (Arc<SimBroker>, Arc<ConnectionSupervisor>) {
        let broker = Arc::new(SimBroker::new());
        let supervisor = Arc::new(ConnectionSupervisor::new(
            broker.clone(),
            fast_config(max_attempts),
        ));
        (broker, supervisor)
    }

    #[tokio::test]
    async fn test_ensure_connected_establishes_session() {
        let (broker, supervisor) = make_supervisor(3);

        assert_eq!(supervisor.state(), ConnectionState::Disconnected);
        supervisor.ensure_connected().await.unwrap();
        assert_eq!(supervisor.state(), ConnectionState::Connected);
        assert!(broker.is_connected().await);
    }

    #[tokio::test]
    async fn test_ensure_connected_is_idempotent() {
        let (_broker, supervisor) = make_supervisor(3);

        supervisor.ensure_connected().await.unwrap();
        supervisor.ensure_connected().await.unwrap();
        assert_eq!(supervisor.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let (broker, supervisor) = make_supervisor(5);
        broker.fail_next_connects(2);

        supervisor.ensure_connected().await.unwrap();
        assert_eq!(supervisor.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_gives_up_after_attempt_budget() {
        let (broker, supervisor) = make_supervisor(2);
        broker.fail_next_connects(10);

        let err = supervisor.ensure_connected().await.unwrap_err();
        assert_eq!(err.error_type(), "connection_failure");
        assert_eq!(supervisor.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_attempt() {
        let (broker, supervisor) = make_supervisor(5);
        broker.fail_next_connects(1);

        let a = {
            let s = supervisor.clone();
            tokio::spawn(async move { s.ensure_connected().await })
        };
        let b = {
            let s = supervisor.clone();
            tokio::spawn(async move { s.ensure_connected().await })
        };

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();
        assert_eq!(supervisor.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_unsolicited_disconnect_schedules_one_reconnect() {
        let (broker, supervisor) = make_supervisor(5);
        supervisor.ensure_connected().await.unwrap();

        broker.drop_connection();
        supervisor.notify_unsolicited_disconnect();
        // A second notification while the task runs is a no-op
        supervisor.notify_unsolicited_disconnect();

        // Let the background task run to completion
        for _ in 0..50 {
            if supervisor.state() == ConnectionState::Connected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(supervisor.state(), ConnectionState::Connected);
        assert!(broker.is_connected().await);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_reconnect() {
        let (broker, supervisor) = make_supervisor(1000);
        supervisor.ensure_connected().await.unwrap();

        broker.drop_connection();
        broker.fail_next_connects(u32::MAX);
        supervisor.notify_unsolicited_disconnect();

        supervisor.shutdown().await;
        assert_eq!(supervisor.state(), ConnectionState::Disconnected);
        assert!(!supervisor.reconnect_in_progress());
    }
}
