//! Progress reporting for task runs

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

/// Receives the percentage complete (0.0 to 100.0) of a running task.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: f64);
}

impl<F> ProgressSink for F
where
    F: Fn(f64) + Send + Sync,
{
    fn report(&self, percent: f64) {
        self(percent)
    }
}

/// Completed vs total work items for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressState {
    pub completed: usize,
    pub total: usize,
}

impl ProgressState {
    pub fn new(total: usize) -> Self {
        Self { completed: 0, total }
    }

    /// Percentage complete. An empty run counts as 0 until it is finished.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.completed as f64 / self.total as f64) * 100.0
    }

    /// Count one more finished item, never past the total
    pub fn advance(&mut self) {
        self.completed = (self.completed + 1).min(self.total);
    }
}

/// Keeps the latest reported value and fans it out to subscribers.
pub struct ProgressTracker {
    latest: RwLock<Option<f64>>,
    progress_tx: broadcast::Sender<f64>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            latest: RwLock::new(None),
            progress_tx,
        }
    }

    /// Last reported percentage, if a run has reported anything yet
    pub fn latest(&self) -> Option<f64> {
        *self.latest.read()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<f64> {
        self.progress_tx.subscribe()
    }

    /// Forget the previous run's value
    pub fn reset(&self) {
        *self.latest.write() = None;
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ProgressTracker {
    fn report(&self, percent: f64) {
        *self.latest.write() = Some(percent);
        // No subscribers is fine
        let _ = self.progress_tx.send(percent);
    }
}

/// Log every progress update until the tracker goes away
pub async fn log_progress(mut rx: broadcast::Receiver<f64>) {
    loop {
        match rx.recv().await {
            Ok(percent) => debug!(percent, "Media extraction progress"),
            Err(RecvError::Lagged(skipped)) => debug!(skipped, "Progress updates skipped"),
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_guards_empty_run() {
        assert_eq!(ProgressState::new(0).percent(), 0.0);
    }

    #[test]
    fn test_advance_is_capped() {
        let mut state = ProgressState::new(2);
        state.advance();
        assert_eq!(state.percent(), 50.0);
        state.advance();
        state.advance();
        assert_eq!(state.completed, 2);
        assert_eq!(state.percent(), 100.0);
    }

    #[tokio::test]
    async fn test_tracker_broadcasts_and_keeps_latest() {
        let tracker = ProgressTracker::new();
        let mut rx = tracker.subscribe();

        tracker.report(25.0);
        tracker.report(50.0);

        assert_eq!(rx.recv().await.unwrap(), 25.0);
        assert_eq!(rx.recv().await.unwrap(), 50.0);
        assert_eq!(tracker.latest(), Some(50.0));

        tracker.reset();
        assert_eq!(tracker.latest(), None);
    }

    #[tokio::test]
    async fn test_log_progress_ends_with_tracker() {
        let tracker = ProgressTracker::new();
        let logger = tokio::spawn(log_progress(tracker.subscribe()));

        tracker.report(10.0);
        tracker.report(100.0);
        drop(tracker);

        tokio::time::timeout(std::time::Duration::from_secs(1), logger)
            .await
            .unwrap()
            .unwrap();
    }
}
