//! Tracing subscriber setup for embedders and tests.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber honoring `RUST_LOG`, defaulting to `info`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    init_with_default("info");
}

/// Install a fmt subscriber with an explicit default filter, still
/// overridable through `RUST_LOG`.
pub fn init_with_default(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_init_is_harmless() {
        init();
        init_with_default("debug");
    }
}
