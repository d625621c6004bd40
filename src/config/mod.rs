//! Application configuration management

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::jobs::{FailurePolicy, MediaExtractTask, TaskTrigger};
use crate::services::{LogFormat, MediaServerConfig};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Media server base URL, e.g. `http://localhost:8096`
    pub media_server_url: String,

    /// API key for the media server
    pub api_key: String,

    /// Optional user whose library view is scanned
    pub user_id: Option<String>,

    /// Per-request HTTP timeout
    pub http_timeout: Duration,

    /// How long to wait for the server to report media streams after a
    /// refresh; zero means fire and forget
    pub refresh_wait: Duration,

    /// Daily run time as an offset from local midnight
    pub time_of_day: Option<Duration>,

    /// Cancel runs that take longer than this
    pub max_runtime: Option<Duration>,

    pub failure_policy: FailurePolicy,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let media_server_url = lookup("MEDIA_SERVER_URL").context("MEDIA_SERVER_URL is required")?;
        let api_key = lookup("MEDIA_SERVER_API_KEY").context("MEDIA_SERVER_API_KEY is required")?;

        let http_timeout = lookup("HTTP_TIMEOUT_SECS")
            .map(|v| parse_positive(&v, 1))
            .transpose()
            .context("Invalid HTTP_TIMEOUT_SECS")?
            .unwrap_or(Duration::from_secs(300));

        let refresh_wait = lookup("REFRESH_WAIT_SECS")
            .map(|v| v.trim().parse::<u64>().map(Duration::from_secs))
            .transpose()
            .context("Invalid REFRESH_WAIT_SECS")?
            .unwrap_or(Duration::from_secs(120));

        let time_of_day = lookup("EXTRACT_TIME_OF_DAY")
            .map(|v| parse_time_of_day(&v))
            .transpose()
            .context("Invalid EXTRACT_TIME_OF_DAY")?;

        let max_runtime = lookup("EXTRACT_MAX_RUNTIME_HOURS")
            .map(|v| parse_positive(&v, 3600))
            .transpose()
            .context("Invalid EXTRACT_MAX_RUNTIME_HOURS")?;

        let failure_policy = match lookup("EXTRACT_FAILURE_POLICY") {
            Some(v) => FailurePolicy::from_arg(&v)
                .with_context(|| format!("Invalid EXTRACT_FAILURE_POLICY: {}", v))?,
            None => FailurePolicy::default(),
        };

        let log_format = match lookup("LOG_FORMAT") {
            Some(v) => LogFormat::from_arg(&v).with_context(|| format!("Invalid LOG_FORMAT: {}", v))?,
            None => LogFormat::default(),
        };

        Ok(Self {
            media_server_url,
            api_key,
            user_id: lookup("MEDIA_SERVER_USER_ID").filter(|v| !v.is_empty()),
            http_timeout,
            refresh_wait,
            time_of_day,
            max_runtime,
            failure_policy,
            log_format,
        })
    }

    pub fn media_server(&self) -> MediaServerConfig {
        MediaServerConfig {
            base_url: self.media_server_url.clone(),
            api_key: self.api_key.clone(),
            user_id: self.user_id.clone(),
            timeout: self.http_timeout,
            refresh_wait: self.refresh_wait,
        }
    }

    /// The task's default triggers with any configured overrides applied
    pub fn triggers(&self) -> Vec<TaskTrigger> {
        MediaExtractTask::default_triggers()
            .into_iter()
            .map(|mut trigger| {
                if let Some(time_of_day) = self.time_of_day {
                    trigger.kind = crate::jobs::TriggerKind::Daily { time_of_day };
                }
                if let Some(max_runtime) = self.max_runtime {
                    trigger.max_runtime = max_runtime;
                }
                trigger
            })
            .collect()
    }
}

/// Parse a non-zero count of `unit_secs`-second units into a duration
fn parse_positive(value: &str, unit_secs: u64) -> Result<Duration> {
    let count: u64 = value.trim().parse().context("not a number")?;
    if count == 0 {
        bail!("must be greater than zero");
    }
    let secs = count
        .checked_mul(unit_secs)
        .with_context(|| format!("value too large: {}", value))?;
    Ok(Duration::from_secs(secs))
}

/// Parse `HH:MM` into an offset from midnight
fn parse_time_of_day(value: &str) -> Result<Duration> {
    let (hour, minute) = value
        .trim()
        .split_once(':')
        .with_context(|| format!("expected HH:MM, got {}", value))?;
    let hour: u64 = hour.parse().context("invalid hour")?;
    let minute: u64 = minute.parse().context("invalid minute")?;
    if hour > 23 || minute > 59 {
        bail!("time out of range: {}", value);
    }
    Ok(Duration::from_secs(hour * 3600 + minute * 60))
}
