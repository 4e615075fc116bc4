//! Shared helpers for the threaded scenario tests

use std::time::Duration;

/// Install a fmt subscriber once so `RUST_LOG` works in the scenario tests.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Spin in millisecond naps until `ready` reports true, or panic after two
/// seconds so a broken primitive fails the test instead of hanging it.
pub fn wait_until(mut ready: impl FnMut() -> bool) {
    for _ in 0..2000 {
        if ready() {
            return;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    panic!("condition not reached within two seconds");
}
