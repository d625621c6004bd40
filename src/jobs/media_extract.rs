//! Media info extraction task
//!
//! Finds stream-link placeholders (`.strm` files and softlinks) that the media
//! server has not probed yet and asks the server to refresh each one, which
//! makes it probe the remote content and record its media streams.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::ExtractError;
use crate::jobs::candidates::select_candidates;
use crate::jobs::dispatcher::{FailurePolicy, RefreshDispatcher, RunOutcome};
use crate::jobs::progress::ProgressSink;
use crate::library::{ItemQuery, LibraryQuery};
use crate::services::refresh::MetadataRefresher;

/// Identity of a scheduled task as shown to operators
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskInfo {
    pub category: &'static str,
    pub key: &'static str,
    pub description: &'static str,
    pub name: &'static str,
}

/// When a task should run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TriggerKind {
    /// Once a day, at this offset from local midnight
    Daily { time_of_day: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskTrigger {
    pub kind: TriggerKind,
    /// Runs still going after this long are cancelled
    pub max_runtime: Duration,
}

impl TaskTrigger {
    pub const fn daily(hour: u64, minute: u64, max_runtime: Duration) -> Self {
        Self {
            kind: TriggerKind::Daily {
                time_of_day: Duration::from_secs(hour * 3600 + minute * 60),
            },
            max_runtime,
        }
    }

    /// Six-field cron expression (seconds first) for this trigger
    pub fn cron_expression(&self) -> String {
        match self.kind {
            TriggerKind::Daily { time_of_day } => {
                let secs = time_of_day.as_secs();
                let hour = (secs / 3600) % 24;
                let minute = (secs % 3600) / 60;
                format!("0 {} {} * * *", minute, hour)
            }
        }
    }
}

static TASK_INFO: TaskInfo = TaskInfo {
    category: "Media Extract",
    key: "MediaExtract Task",
    description: "Run Media Info Extraction",
    name: "Process Media targets",
};

const DEFAULT_TRIGGER: TaskTrigger = TaskTrigger::daily(3, 0, Duration::from_secs(24 * 3600));

/// Scheduled task that probes unprobed stream placeholders.
pub struct MediaExtractTask {
    library: Arc<dyn LibraryQuery>,
    refresher: Arc<dyn MetadataRefresher>,
    failure_policy: FailurePolicy,
}

impl MediaExtractTask {
    pub fn new(library: Arc<dyn LibraryQuery>, refresher: Arc<dyn MetadataRefresher>) -> Self {
        Self {
            library,
            refresher,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn info() -> &'static TaskInfo {
        &TASK_INFO
    }

    pub fn default_triggers() -> Vec<TaskTrigger> {
        vec![DEFAULT_TRIGGER]
    }

    /// Run the task once: list items, select candidates, refresh them.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> Result<RunOutcome, ExtractError> {
        info!(task = TASK_INFO.key, "Task started");

        let items = self
            .library
            .query(&ItemQuery::refresh_targets())
            .await
            .map_err(|e| {
                error!(error = %e, "Library query failed");
                ExtractError::Query(e)
            })?;
        info!(count = items.len(), "Library items scanned");

        let candidates = select_candidates(items);
        info!(count = candidates.len(), "Refresh targets selected");

        let outcome = RefreshDispatcher::new(&*self.refresher, self.failure_policy)
            .run(&candidates, cancel, progress)
            .await?;

        info!(
            task = TASK_INFO.key,
            status = ?outcome.status,
            total = outcome.total,
            refreshed = outcome.refreshed,
            failed = outcome.failed,
            "Task finished"
        );
        Ok(outcome)
    }
}
