//! Retry with exponential backoff.

use std::future::Future;

use tokio::time::sleep;
use tracing::warn;

use elementhook_remote::RemoteError;

use crate::policy::RetryPolicy;

/// Run `operation`, retrying transient failures per `policy`.
///
/// Non-retryable errors are returned after the first attempt.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    label: &str,
    operation: F,
) -> Result<T, RemoteError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if !e.is_retryable() || attempt >= policy.max_retries {
                    return Err(e);
                }

                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    "Fetch {} failed (attempt {}/{}): {}, retrying in {:?}",
                    label,
                    attempt + 1,
                    policy.max_retries + 1,
                    e,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
