//! Errors surfaced by an extraction run

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// The library could not be listed; nothing was refreshed
    #[error("library query failed: {0:#}")]
    Query(anyhow::Error),

    /// A refresh failed while running with [FailurePolicy::Abort](crate::jobs::FailurePolicy::Abort)
    #[error("refresh failed for {path}: {reason:#}")]
    Refresh { path: String, reason: anyhow::Error },
}
