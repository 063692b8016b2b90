//! Progress reporting: one mutable state, any number of passive listeners.
//!
//! The reporter is an injected handle, not a module-level singleton, so
//! independent pipeline invocations can run concurrently without shared
//! state. Broadcast is non-blocking and lossy-safe: a subscriber whose
//! queue is full or closed is dropped rather than allowed to stall the
//! workers.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Queue depth per subscriber. Slow consumers falling further behind than
/// this are disconnected.
const SUBSCRIBER_QUEUE: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    pub current: usize,
    pub total: usize,
    pub message: String,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            current: 0,
            total: 0,
            message: "waiting".to_string(),
        }
    }
}

#[derive(Default)]
pub struct ProgressReporter {
    state: Mutex<ProgressState>,
    subscribers: Mutex<Vec<mpsc::Sender<ProgressState>>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reinitialize at the start of a pipeline invocation.
    pub fn reset(&self, total: usize) {
        self.update(0, total, "starting");
    }

    /// Replace the state and broadcast it to all live subscribers.
    pub fn update(&self, current: usize, total: usize, message: impl Into<String>) {
        let state = ProgressState {
            current,
            total,
            message: message.into(),
        };

        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state.clone();

        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| match tx.try_send(state.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => false,
        });
    }

    /// The current state (poll interface).
    pub fn snapshot(&self) -> ProgressState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Subscribe to state changes (push interface).
    pub fn subscribe(&self) -> mpsc::Receiver<ProgressState> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE);
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_latest_update() {
        let reporter = ProgressReporter::new();
        assert_eq!(reporter.snapshot(), ProgressState::default());

        reporter.update(2, 5, "b.pdf");
        let state = reporter.snapshot();
        assert_eq!(state.current, 2);
        assert_eq!(state.total, 5);
        assert_eq!(state.message, "b.pdf");
    }

    #[tokio::test]
    async fn subscriber_receives_updates_in_order() {
        let reporter = ProgressReporter::new();
        let mut rx = reporter.subscribe();

        reporter.update(1, 3, "a.pdf");
        reporter.update(2, 3, "b.pdf");

        assert_eq!(rx.recv().await.unwrap().message, "a.pdf");
        assert_eq!(rx.recv().await.unwrap().message, "b.pdf");
    }

    #[tokio::test]
    async fn slow_subscriber_is_dropped_not_blocking() {
        let reporter = ProgressReporter::new();
        let _rx = reporter.subscribe();
        assert_eq!(reporter.subscriber_count(), 1);

        // Overfill the bounded queue; the producer must never block.
        for i in 0..SUBSCRIBER_QUEUE + 1 {
            reporter.update(i, SUBSCRIBER_QUEUE + 1, "tick");
        }
        assert_eq!(reporter.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn closed_subscriber_is_pruned() {
        let reporter = ProgressReporter::new();
        let rx = reporter.subscribe();
        drop(rx);

        reporter.update(1, 1, "done");
        assert_eq!(reporter.subscriber_count(), 0);
    }

    #[test]
    fn reset_starts_a_new_run() {
        let reporter = ProgressReporter::new();
        reporter.update(5, 5, "all done");
        reporter.reset(10);
        let state = reporter.snapshot();
        assert_eq!((state.current, state.total), (0, 10));
    }
}
