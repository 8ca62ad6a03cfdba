//! Broker advisory code classification.
//!
//! The broker emits numbered advisories over the session; a fixed
//! allow-list separates routine connectivity notices from codes that
//! require attention. Unknown codes are treated as actionable so new
//! advisories are never silently downgraded.

/// Severity bucket for a broker advisory code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeSeverity {
    /// Routine notice; logged at debug level.
    Informational,
    /// Requires attention; logged at warn level.
    Actionable,
}

/// Advisory codes that are routine connectivity/market-data notices.
const INFORMATIONAL_CODES: &[i32] = &[
    1101, // Connectivity restored - data lost
    1102, // Connectivity restored - data maintained
    2103, // Market data farm connection is broken
    2104, // Market data farm connection is OK
    2105, // HMDS data farm connection is broken
    2106, // HMDS data farm connection is OK
    2107, // HMDS data farm connection is inactive
    2108, // Market data farm connection is inactive
    2119, // Market data farm is connecting
    2158, // Sec-def data farm connection is OK
];

/// Classify a broker advisory code against the fixed allow-list.
#[must_use]
pub fn classify_code(code: i32) -> CodeSeverity {
    if INFORMATIONAL_CODES.contains(&code) {
        CodeSeverity::Informational
    } else {
        CodeSeverity::Actionable
    }
}

/// Log a broker advisory at the severity its code warrants.
pub fn log_advisory(code: i32, message: &str) {
    match classify_code(code) {
        CodeSeverity::Informational => {
            tracing::debug!(code, message, "broker advisory");
        }
        CodeSeverity::Actionable => {
            tracing::warn!(code, message, "broker advisory requires attention");
        }
    }
}
