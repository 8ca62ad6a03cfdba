//! Append-only audit trail of safety decisions and violations.
//!
//! Every gate decision produces exactly one record, tagged with the
//! per-process session id. Sensitive payload fields are redacted before
//! recording; account identifiers are preserved since they are required
//! for traceability.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::SafetyVerdict;
use crate::models::OperationKind;

/// Replacement written over sensitive payload values.
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Field-name fragments treated as sensitive (case-insensitive).
const SENSITIVE_FRAGMENTS: &[&str] = &["password", "secret", "key", "token"];

/// One audit trail entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Per-process session id.
    pub session_id: String,
    /// When the decision was made.
    pub timestamp: DateTime<Utc>,
    /// Operation kind the decision applied to.
    pub operation_kind: OperationKind,
    /// Request payload with sensitive fields redacted.
    pub sanitized_payload: Value,
    /// The verdict that was returned to the caller.
    pub verdict: SafetyVerdict,
}

/// In-memory append-only audit log with bounded retention.
#[derive(Debug)]
pub struct AuditLogger {
    session_id: String,
    capacity: usize,
    records: Mutex<VecDeque<AuditRecord>>,
}

impl AuditLogger {
    /// Create a logger with a fresh session id.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            capacity: capacity.max(1),
            records: Mutex::new(VecDeque::new()),
        }
    }

    /// The per-process session id stamped on every record.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Record a gate decision (safe or not).
    pub fn record_decision(&self, kind: OperationKind, payload: &Value, verdict: &SafetyVerdict) {
        let record = AuditRecord {
            session_id: self.session_id.clone(),
            timestamp: Utc::now(),
            operation_kind: kind,
            sanitized_payload: sanitize_payload(payload),
            verdict: verdict.clone(),
        };

        tracing::info!(
            target: "audit",
            session_id = %self.session_id,
            kind = %kind,
            is_safe = verdict.is_safe,
            errors = verdict.errors.len(),
            warnings = verdict.warnings.len(),
            "safety decision"
        );

        self.append(record);
    }

    /// Record a standalone safety violation outside a gate decision.
    pub fn record_violation(&self, kind: OperationKind, detail: &str) {
        let verdict = SafetyVerdict {
            is_safe: false,
            errors: vec![detail.to_string()],
            warnings: Vec::new(),
            checks_performed: Vec::new(),
        };

        tracing::warn!(
            target: "audit",
            session_id = %self.session_id,
            kind = %kind,
            detail = %detail,
            "safety violation"
        );

        self.append(AuditRecord {
            session_id: self.session_id.clone(),
            timestamp: Utc::now(),
            operation_kind: kind,
            sanitized_payload: Value::Null,
            verdict,
        });
    }

    /// The most recent `n` records, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<AuditRecord> {
        let records = self
            .records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let skip = records.len().saturating_sub(n);
        records.iter().skip(skip).cloned().collect()
    }

    /// Number of retained records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn append(&self, record: AuditRecord) {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        records.push_back(record);
        while records.len() > self.capacity {
            records.pop_front();
        }
    }
}

/// Replace sensitive field values with the redaction marker, recursively.
///
/// Account identifiers are intentionally preserved.
#[must_use]
pub fn sanitize_payload(payload: &Value) -> Value {
    match payload {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                if is_sensitive_field(key) {
                    out.insert(key.clone(), Value::String(REDACTION_MARKER.to_string()));
                } else {
                    out.insert(key.clone(), sanitize_payload(value));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_payload).collect()),
        other => other.clone(),
    }
}

fn is_sensitive_field(name: &str) -> bool {
    let lower = name.to_lowercase();
    SENSITIVE_FRAGMENTS.iter().any(|f| lower.contains(f))
}
