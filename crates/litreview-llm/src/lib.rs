//! LLM adapter interface and concrete providers.
//!
//! The pipeline depends on exactly one capability: `generate(prompt, files)
//! -> text`. Providers are interchangeable implementations of
//! [`LlmBackend`], injected at construction. Error classification (rate
//! limit vs. auth vs. content policy vs. transient network) lives here; the
//! pipeline only consumes success or failure.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

pub mod gemini;
pub mod mock;
pub mod openai;
mod retry;

pub use gemini::GeminiBackend;
pub use mock::{MockBackend, MockReply};
pub use openai::OpenAiBackend;
pub use retry::{DEFAULT_MAX_RETRIES, generate_with_retry};

/// Error type for generation calls, distinguishing abandon-worthy failures
/// from retry-worthy ones.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Server returned 429 (rate limited / out of quota).
    #[error("rate limited (429)")]
    RateLimited { retry_after: Option<Duration> },
    /// Key rejected or missing. Not worth retrying with the same credential.
    #[error("authentication rejected: {0}")]
    Auth(String),
    /// The provider refused the content. Permanent for this input.
    #[error("content blocked: {0}")]
    ContentBlocked(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("empty reply from model")]
    EmptyReply,
    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Whether a retry with backoff has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. } | LlmError::Timeout(_) | LlmError::Http(_)
        )
    }
}

/// A text-generation backend.
///
/// `files` are attached to the request in whatever form the provider
/// supports (inline upload, flattened text). An empty slice is a plain
/// text-only completion.
pub trait LlmBackend: Send + Sync {
    /// The canonical provider name (e.g., "Gemini", "OpenAI").
    fn name(&self) -> &str;

    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        files: &'a [PathBuf],
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>>;
}

/// Map a reqwest transport error onto the taxonomy.
pub(crate) fn transport_error(e: reqwest::Error, timeout: Duration) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout(timeout)
    } else {
        LlmError::Http(e.to_string())
    }
}

/// Parse an HTTP `Retry-After` header value (seconds form only).
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(LlmError::RateLimited { retry_after: None }.is_transient());
        assert!(LlmError::Timeout(Duration::from_secs(5)).is_transient());
        assert!(LlmError::Http("HTTP 502".into()).is_transient());
        assert!(!LlmError::Auth("bad key".into()).is_transient());
        assert!(!LlmError::ContentBlocked("policy".into()).is_transient());
        assert!(!LlmError::EmptyReply.is_transient());
    }

    #[test]
    fn retry_after_seconds() {
        assert_eq!(parse_retry_after("30"), Some(Duration::from_secs(30)));
        assert_eq!(parse_retry_after(" 5 "), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after("Wed, 21 Oct"), None);
    }
}
