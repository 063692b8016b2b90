//! Bounded retry with jittered exponential backoff for transient errors.

use std::path::PathBuf;
use std::time::Duration;

use crate::{LlmBackend, LlmError};

/// Default retry budget for transient errors.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Call `backend.generate`, retrying transient failures up to `max_retries`
/// times with doubling, jittered backoff.
///
/// A 429 with a `Retry-After` hint sleeps for exactly that long instead of
/// the backoff schedule. Auth and content-policy errors are returned
/// immediately; they never resolve on retry.
pub async fn generate_with_retry(
    backend: &dyn LlmBackend,
    prompt: &str,
    files: &[PathBuf],
    client: &reqwest::Client,
    timeout: Duration,
    max_retries: u32,
) -> Result<String, LlmError> {
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 0u32;

    loop {
        match backend.generate(prompt, files, client, timeout).await {
            Ok(text) => return Ok(text),
            Err(err) if err.is_transient() && attempt < max_retries => {
                attempt += 1;
                let wait = match &err {
                    LlmError::RateLimited {
                        retry_after: Some(d),
                    } => *d,
                    _ => jittered(backoff),
                };
                tracing::warn!(
                    backend = backend.name(),
                    attempt,
                    wait_secs = wait.as_secs_f64(),
                    error = %err,
                    "transient error, backing off"
                );
                tokio::time::sleep(wait).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            Err(err) => return Err(err),
        }
    }
}

/// Scale a base delay by a random factor in [0.5, 1.5).
fn jittered(base: Duration) -> Duration {
    base.mul_f64(0.5 + fastrand::f64())
}
