//! Error taxonomy for the trading gate.
//!
//! Every externally visible call returns either a success payload or one of
//! these variants, carrying a machine-readable category plus human-readable
//! detail. Retry policy per variant:
//!
//! | Variant | Retried |
//! |---------|---------|
//! | `ConnectionFailure` | bounded attempts with backoff, then surfaced |
//! | `ValidationFailure` | never |
//! | `SafetyViolation` | never; broker never contacted |
//! | `OrderNotFound` | never |
//! | `BrokerRejection` | never auto-retried |

use thiserror::Error;

use crate::broker::BrokerError;

/// Error returned by gate, lifecycle, and connection operations.
#[derive(Debug, Clone, Error)]
pub enum GateError {
    /// Broker unreachable after bounded retry attempts.
    #[error("broker connection failed: {message}")]
    ConnectionFailure {
        /// Failure details.
        message: String,
    },

    /// Malformed request parameters; surfaced immediately.
    #[error("invalid parameters: {message}")]
    ValidationFailure {
        /// What was malformed.
        message: String,
    },

    /// Operation blocked by safety checks; every reason is itemised
    /// (kill switch is reported alone since it is dispositive).
    #[error("operation blocked by safety checks: {}", reasons.join("; "))]
    SafetyViolation {
        /// Every reason the operation was rejected, in check order.
        reasons: Vec<String>,
    },

    /// Order unknown both locally and at the broker.
    #[error("order {order_id} not found")]
    OrderNotFound {
        /// The missing order ID.
        order_id: String,
    },

    /// Broker refused an otherwise valid order.
    #[error("order rejected by broker: {reason}")]
    BrokerRejection {
        /// Broker-supplied rejection detail.
        reason: String,
    },
}

impl GateError {
    /// Machine-readable error category.
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::ConnectionFailure { .. } => "connection_failure",
            Self::ValidationFailure { .. } => "validation_failure",
            Self::SafetyViolation { .. } => "safety_violation",
            Self::OrderNotFound { .. } => "order_not_found",
            Self::BrokerRejection { .. } => "broker_rejection",
        }
    }

    /// Convenience constructor for validation failures.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailure {
            message: message.into(),
        }
    }
}

impl From<BrokerError> for GateError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::NotConnected | BrokerError::Timeout => Self::ConnectionFailure {
                message: err.to_string(),
            },
            BrokerError::Transport { message } => Self::ConnectionFailure { message },
            BrokerError::Rejected { reason } => Self::BrokerRejection { reason },
            BrokerError::OrderNotFound { order_id } => Self::OrderNotFound { order_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_categories() {
        let err = GateError::validation("quantity must be positive");
        assert_eq!(err.error_type(), "validation_failure");

        let err = GateError::SafetyViolation {
            reasons: vec!["rate limit exceeded".to_string()],
        };
        assert_eq!(err.error_type(), "safety_violation");
    }

    #[test]
    fn test_safety_violation_joins_reasons() {
        let err = GateError::SafetyViolation {
            reasons: vec!["first".to_string(), "second".to_string()],
        };
        assert!(err.to_string().contains("first; second"));
    }

    #[test]
    fn test_broker_error_mapping() {
        let err: GateError = BrokerError::NotConnected.into();
        assert_eq!(err.error_type(), "connection_failure");

        let err: GateError = BrokerError::Rejected {
            reason: "insufficient margin".to_string(),
        }
        .into();
        assert_eq!(err.error_type(), "broker_rejection");

        let err: GateError = BrokerError::OrderNotFound {
            order_id: "42".to_string(),
        }
        .into();
        assert_eq!(err.error_type(), "order_not_found");
    }
}
