//! Tracing setup for tests.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber honouring `RUST_LOG`, defaulting to `warn`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_target(false)
        .try_init();
}
