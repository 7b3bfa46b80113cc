//! Tracing initialisation helpers for tests.
//!
//! Call [`init_test_tracing`] at the top of any test that wants lifecycle and
//! request events captured by the test harness. The subscriber is installed
//! at most once per process, so every test may call it.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset: sockserve crates at `debug`,
/// everything else at `warn`.
pub const DEFAULT_TEST_FILTER: &str = "warn,sockserve_core=debug,sockserve_config=debug";

/// Initialise a subscriber that writes to the test-harness writer.
///
/// Subsequent calls are silently ignored.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER)),
        )
        .with_test_writer()
        .try_init();
}
