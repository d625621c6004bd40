//! Sequential refresh of candidates with cancellation and progress reporting.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::ExtractError;
use crate::jobs::candidates::RefreshCandidate;
use crate::jobs::progress::{ProgressSink, ProgressState};
use crate::services::refresh::{MetadataRefreshOptions, MetadataRefresher};

/// What to do when the refresh of a single item fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the failure and move on to the next item
    #[default]
    Isolate,
    /// Stop the run and report it as failed
    Abort,
}

impl FailurePolicy {
    pub fn from_arg(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "isolate" | "continue" => Some(FailurePolicy::Isolate),
            "abort" => Some(FailurePolicy::Abort),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Cancelled,
}

/// Summary of a finished (or cancelled) run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub total: usize,
    /// Items whose refresh returned successfully
    pub refreshed: usize,
    /// Items whose refresh failed and were skipped
    pub failed: usize,
}

impl RunOutcome {
    pub fn is_cancelled(&self) -> bool {
        self.status == RunStatus::Cancelled
    }
}

/// Refreshes candidates one at a time.
pub struct RefreshDispatcher<'a> {
    refresher: &'a dyn MetadataRefresher,
    options: MetadataRefreshOptions,
    policy: FailurePolicy,
}

impl<'a> RefreshDispatcher<'a> {
    pub fn new(refresher: &'a dyn MetadataRefresher, policy: FailurePolicy) -> Self {
        Self {
            refresher,
            options: MetadataRefreshOptions::stream_probe(),
            policy,
        }
    }

    /// Refresh every candidate in order.
    ///
    /// Cancellation is checked before each item. A cancelled run stops
    /// without reporting 100; a completed run always ends with a 100 report.
    pub async fn run(
        &self,
        candidates: &[RefreshCandidate],
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> Result<RunOutcome, ExtractError> {
        let mut state = ProgressState::new(candidates.len());
        let mut outcome = RunOutcome {
            status: RunStatus::Completed,
            total: candidates.len(),
            refreshed: 0,
            failed: 0,
        };

        for candidate in candidates {
            if cancel.is_cancelled() {
                info!("Task cancelled");
                outcome.status = RunStatus::Cancelled;
                return Ok(outcome);
            }

            progress.report(state.percent());

            let result = self
                .refresher
                .refresh(candidate.item(), &self.options, cancel)
                .await;

            match result {
                Ok(()) => outcome.refreshed += 1,
                Err(e) if cancel.is_cancelled() => {
                    info!(path = %candidate.path(), error = %e, "Refresh interrupted, task cancelled");
                    outcome.status = RunStatus::Cancelled;
                    return Ok(outcome);
                }
                Err(e) => match self.policy {
                    FailurePolicy::Isolate => {
                        warn!(path = %candidate.path(), error = %e, "Refresh failed, skipping item");
                        outcome.failed += 1;
                    }
                    FailurePolicy::Abort => {
                        return Err(ExtractError::Refresh {
                            path: candidate.path().to_string(),
                            reason: e,
                        });
                    }
                },
            }

            info!(
                current = state.completed,
                total = state.total,
                path = %candidate.path(),
                "Item processed"
            );
            state.advance();
        }

        progress.report(100.0);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_policy_from_arg() {
        assert_eq!(FailurePolicy::from_arg("Abort"), Some(FailurePolicy::Abort));
        assert_eq!(FailurePolicy::from_arg("isolate"), Some(FailurePolicy::Isolate));
        assert_eq!(FailurePolicy::from_arg("retry"), None);
    }
}
