//! Timeout enforcement.

use std::future::Future;
use std::time::Duration;

use tokio::time::error::Elapsed;

/// Upper bound for a single probe, connect included.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Run `future` with a deadline.
pub async fn with_timeout<F>(limit: Duration, future: F) -> Result<F::Output, Elapsed>
where
    F: Future,
{
    tokio::time::timeout(limit, future).await
}
