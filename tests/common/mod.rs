//! Common test utilities shared by the integration suites.

pub mod fixtures;

use std::sync::Once;

static INIT: Once = Once::new();

/// Install a tracing subscriber honoring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
