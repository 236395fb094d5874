//! Transactional retry wrapper: exponential backoff over catalog
//! operations, short-circuiting on errors the `IcelakeError` taxonomy
//! marks non-retryable.

use std::future::Future;
use std::time::Duration;

use exponential_backoff::Backoff;
use icelake_core::IcelakeError;
use tracing::{error, warn};

const MAX_RETRIES: u32 = 3;
const MIN_BACKOFF: Duration = Duration::from_millis(50);
const MAX_BACKOFF: Duration = Duration::from_secs(2);

/// Runs `op` until it succeeds, returns a non-retryable error, or exhausts
/// `MAX_RETRIES` attempts on transient errors.
pub async fn with_retry<T, F, Fut>(operation: &str, mut op: F) -> Result<T, IcelakeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, IcelakeError>>,
{
    let backoff = Backoff::new(MAX_RETRIES, MIN_BACKOFF, Some(MAX_BACKOFF));
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => {
                attempt += 1;
                match backoff.next(attempt) {
                    Some(delay) => {
                        warn!(operation, attempt, ?delay, %err, "retrying transient catalog error");
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        error!(operation, attempt, "catalog retries exhausted");
                        return Err(IcelakeError::transient(format!(
                            "{operation}: retries exhausted after {attempt} attempts: {err}"
                        )));
                    }
                }
            }
            Err(err) => return Err(err),
        }
    }
}
