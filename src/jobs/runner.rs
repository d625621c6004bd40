//! Runs the extraction task on behalf of the scheduler.
//!
//! Owns the lifecycle concerns around a single run: only one run at a time,
//! cancellation once the trigger's max runtime has passed, progress
//! publication, and the record of the last run.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::ExtractError;
use crate::jobs::dispatcher::RunOutcome;
use crate::jobs::media_extract::MediaExtractTask;
use crate::jobs::progress::ProgressTracker;

/// Result of the most recent run
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub outcome: Option<RunOutcome>,
    pub error: Option<String>,
}

/// Clears the active slot and stops the watchdog when a run ends, even if the
/// task panicked or the run future was dropped.
struct ActiveRun<'a> {
    slot: &'a Mutex<Option<CancellationToken>>,
    watchdog: JoinHandle<()>,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.watchdog.abort();
        *self.slot.lock() = None;
    }
}

pub struct TaskRunner {
    task: MediaExtractTask,
    max_runtime: Duration,
    progress: Arc<ProgressTracker>,
    /// Token of the run in progress, if any
    active: Mutex<Option<CancellationToken>>,
    shutdown: CancellationToken,
    last_run: RwLock<Option<RunRecord>>,
}

impl TaskRunner {
    pub fn new(task: MediaExtractTask, max_runtime: Duration) -> Self {
        Self {
            task,
            max_runtime,
            progress: Arc::new(ProgressTracker::new()),
            active: Mutex::new(None),
            shutdown: CancellationToken::new(),
            last_run: RwLock::new(None),
        }
    }

    pub fn progress(&self) -> Arc<ProgressTracker> {
        self.progress.clone()
    }

    pub fn is_running(&self) -> bool {
        self.active.lock().is_some()
    }

    pub fn last_run(&self) -> Option<RunRecord> {
        self.last_run.read().clone()
    }

    /// Run the task now. Returns `Ok(None)` without doing anything if a run
    /// is already in progress.
    pub async fn run(&self) -> Result<Option<RunOutcome>, ExtractError> {
        let token = {
            let mut active = self.active.lock();
            if active.is_some() {
                warn!("Media extraction already running, skipping this trigger");
                return Ok(None);
            }
            let token = self.shutdown.child_token();
            *active = Some(token.clone());
            token
        };

        self.progress.reset();
        let started_at = Local::now();

        let watchdog = {
            let token = token.clone();
            let max_runtime = self.max_runtime;
            tokio::spawn(async move {
                tokio::time::sleep(max_runtime).await;
                warn!(max_runtime_secs = max_runtime.as_secs(), "Max runtime reached, cancelling run");
                token.cancel();
            })
        };
        let guard = ActiveRun {
            slot: &self.active,
            watchdog,
        };

        let result = self.task.execute(&token, &*self.progress).await;
        drop(guard);

        let record = RunRecord {
            started_at,
            finished_at: Local::now(),
            outcome: result.as_ref().ok().cloned(),
            error: result.as_ref().err().map(|e| e.to_string()),
        };
        *self.last_run.write() = Some(record);

        result.map(Some)
    }

    /// Cancel the run in progress. Returns false if nothing was running.
    pub fn cancel(&self) -> bool {
        match self.active.lock().as_ref() {
            Some(token) => {
                info!("Cancelling media extraction run");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel the current run and every later one.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Resolves once [shutdown](Self::shutdown) has been called.
    pub async fn shutdown_requested(&self) {
        self.shutdown.cancelled().await
    }
}
