//! Mock backend for testing.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::{LlmBackend, LlmError};

/// A configurable mock reply for [`MockBackend`].
#[derive(Clone, Debug)]
pub enum MockReply {
    /// Simulate a successful generation.
    Text(String),
    /// Simulate a 429 response.
    RateLimited { retry_after: Option<Duration> },
    /// Simulate a rejected credential.
    Auth(String),
    /// Simulate a content-policy refusal.
    Blocked(String),
    /// Simulate a transient HTTP failure.
    Error(String),
}

impl MockReply {
    fn into_result(self) -> Result<String, LlmError> {
        match self {
            MockReply::Text(t) => Ok(t),
            MockReply::RateLimited { retry_after } => Err(LlmError::RateLimited { retry_after }),
            MockReply::Auth(msg) => Err(LlmError::Auth(msg)),
            MockReply::Blocked(msg) => Err(LlmError::ContentBlocked(msg)),
            MockReply::Error(msg) => Err(LlmError::Http(msg)),
        }
    }
}

/// A hand-rolled mock implementing [`LlmBackend`] for tests.
///
/// Supports:
/// - A fixed reply (used for every call), **or**
/// - A sequence of replies (one per call, repeating the last if exhausted), **or**
/// - Per-file replies keyed by the basename of the first attached file.
/// - Optional per-call latency.
/// - Call counting and a log of which files each call carried.
pub struct MockBackend {
    fallback: MockReply,
    sequence: Mutex<Vec<MockReply>>,
    by_file: HashMap<String, MockReply>,
    delay: Option<Duration>,
    call_count: AtomicUsize,
    calls: Mutex<Vec<Vec<String>>>,
}

impl MockBackend {
    /// Create a mock that always returns `reply`.
    pub fn new(reply: MockReply) -> Self {
        Self {
            fallback: reply,
            sequence: Mutex::new(Vec::new()),
            by_file: HashMap::new(),
            delay: None,
            call_count: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that returns replies in order, repeating the last one.
    pub fn with_sequence(mut replies: Vec<MockReply>) -> Self {
        assert!(!replies.is_empty(), "sequence must have at least one reply");
        let fallback = replies.last().cloned().unwrap();
        // Reverse so we can pop() from the front cheaply.
        replies.reverse();
        Self {
            fallback,
            sequence: Mutex::new(replies),
            by_file: HashMap::new(),
            delay: None,
            call_count: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Override the reply for calls whose first attached file has this basename.
    pub fn reply_for(mut self, file_name: &str, reply: MockReply) -> Self {
        self.by_file.insert(file_name.to_string(), reply);
        self
    }

    /// Set simulated latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `generate()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Basenames of the files attached to each call, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    fn next_reply(&self, files: &[PathBuf]) -> MockReply {
        if let Some(first) = files.first()
            && let Some(name) = first.file_name().and_then(|n| n.to_str())
            && let Some(reply) = self.by_file.get(name)
        {
            return reply.clone();
        }
        let mut seq = self.sequence.lock().unwrap();
        seq.pop().unwrap_or_else(|| self.fallback.clone())
    }
}

impl LlmBackend for MockBackend {
    fn name(&self) -> &str {
        "Mock"
    }

    fn generate<'a>(
        &'a self,
        _prompt: &'a str,
        files: &'a [PathBuf],
        _client: &'a reqwest::Client,
        _timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(
            files
                .iter()
                .filter_map(|f| f.file_name().and_then(|n| n.to_str()))
                .map(String::from)
                .collect(),
        );
        let reply = self.next_reply(files);
        let delay = self.delay;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            reply.into_result()
        })
    }
}
