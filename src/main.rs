//! strm-extract - scheduled media info extraction for `.strm` placeholders
//!
//! Runs next to an Emby/Jellyfin-style media server and, once a day, asks it
//! to probe every stream placeholder that has no media streams recorded yet.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use strm_extract::cli::CliOptions;
use strm_extract::config::Config;
use strm_extract::jobs::{self, MediaExtractTask, TaskRunner};
use strm_extract::services::{MediaServerClient, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    init_tracing(config.log_format)?;
    let cli = CliOptions::from_args();

    let task_info = MediaExtractTask::info();
    info!(task = task_info.name, category = task_info.category, "Starting strm-extract");

    let client = Arc::new(MediaServerClient::new(config.media_server())?);
    match client.server_info().await {
        Ok(server) => info!(server = %server.server_name, version = %server.version, "Media server reachable"),
        Err(e) => warn!(error = %e, "Failed to read media server info - continuing anyway"),
    }

    let task = MediaExtractTask::new(client.clone(), client)
        .with_failure_policy(config.failure_policy);

    let triggers = config.triggers();
    let max_runtime = triggers
        .iter()
        .map(|t| t.max_runtime)
        .max()
        .unwrap_or(Duration::from_secs(24 * 3600));
    let runner = Arc::new(TaskRunner::new(task, max_runtime));
    tokio::spawn(jobs::log_progress(runner.progress().subscribe()));

    let signal_runner = runner.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            signal_runner.shutdown();
        }
    });

    if cli.once {
        let outcome = runner.run().await?;
        info!(?outcome, "One-shot run finished");
        return Ok(());
    }

    let mut scheduler = jobs::start_scheduler(runner.clone(), &triggers).await?;

    if cli.run_on_start {
        let startup_runner = runner.clone();
        tokio::spawn(async move {
            if let Err(e) = startup_runner.run().await {
                error!("Media extraction error: {}", e);
            }
        });
    }

    runner.shutdown_requested().await;
    scheduler.shutdown().await?;
    info!("Scheduler stopped");

    Ok(())
}
