//! Background job scheduling and workers

pub mod candidates;
pub mod dispatcher;
pub mod media_extract;
pub mod progress;
pub mod runner;

use std::sync::Arc;

use chrono::Local;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

pub use candidates::{RefreshCandidate, is_stream_placeholder, needs_refresh, select_candidates};
pub use dispatcher::{FailurePolicy, RefreshDispatcher, RunOutcome, RunStatus};
pub use media_extract::{MediaExtractTask, TaskInfo, TaskTrigger, TriggerKind};
pub use progress::{ProgressSink, ProgressState, ProgressTracker, log_progress};
pub use runner::{RunRecord, TaskRunner};

/// Cron job (local time) that runs the extraction for one trigger
pub fn extraction_job(runner: Arc<TaskRunner>, trigger: &TaskTrigger) -> anyhow::Result<Job> {
    let schedule = trigger.cron_expression();
    let job = Job::new_async_tz(schedule.as_str(), Local, move |_uuid, _l| {
        let runner = runner.clone();
        Box::pin(async move {
            info!("Running media extraction");
            if let Err(e) = runner.run().await {
                tracing::error!("Media extraction error: {}", e);
            }
        })
    })?;
    Ok(job)
}

/// Initialize and start the job scheduler with one job per trigger.
pub async fn start_scheduler(
    runner: Arc<TaskRunner>,
    triggers: &[TaskTrigger],
) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    for trigger in triggers {
        scheduler.add(extraction_job(runner.clone(), trigger)?).await?;
        info!(schedule = %trigger.cron_expression(), "Media extraction scheduled");
    }

    scheduler.start().await?;

    info!("Job scheduler started");
    Ok(scheduler)
}
