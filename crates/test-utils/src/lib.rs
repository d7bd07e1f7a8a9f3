pub mod builders;
pub mod fake_backend;

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Route the supervisor's logs into the test harness.
///
/// Step failures reach the log as `error!` lines carrying the captured git or
/// publish output; a failing test prints them. Filter with `RUST_LOG`,
/// default `info`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Bound a test that drives real processes or the deploy loop.
///
/// The loop only ends on a failure or an interrupt; 10 seconds is the cap.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(10), f)
        .await
        .expect("Test timed out after 10 seconds")
}
