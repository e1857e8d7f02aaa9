//! Shared fixtures for the spabuild integration tests.

pub mod builders;
pub mod fake_executor;
pub mod project;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

static TRACING: Once = Once::new();

/// Deadline for [`with_timeout`]. Tests driven by a paused clock never hit it.
pub const TEST_DEADLINE: Duration = Duration::from_secs(10);

/// Route build logs through the test harness writer.
///
/// Output only shows up for failing tests (or with `--nocapture`). The level
/// follows `SPABUILD_LOG`, e.g. `SPABUILD_LOG=spabuild=debug`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_env("SPABUILD_LOG")
            .unwrap_or_else(|_| EnvFilter::new("warn,spabuild=info"));

        // Another test binary may have installed one already.
        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(false)
            .try_init();
    });
}

/// Fail the test instead of hanging when a build never settles.
pub async fn with_timeout<F, T>(fut: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(TEST_DEADLINE, fut).await {
        Ok(value) => value,
        Err(_) => panic!("build did not settle within {TEST_DEADLINE:?}"),
    }
}
