//! Tracing setup.
//!
//! Console subscriber with `RUST_LOG`-driven filtering. The audit trail
//! emits its events under the `audit` target, so `RUST_LOG=audit=info`
//! isolates safety decisions.

use tracing_subscriber::EnvFilter;

/// Initialize console tracing.
///
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
    }
}
