use chrono::{DateTime, Utc};
use croner::errors::CronError;
use croner::Cron;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Result, UpdateError};
use crate::options::UpdaterOptions;

/// Parse a six-field (seconds first) cron expression.
pub fn parse_cron(expression: &str) -> std::result::Result<Cron, CronError> {
    Cron::new(expression.trim()).with_seconds_required().parse()
}

#[derive(Debug, Clone)]
enum Trigger {
    Interval(Duration),
    Cron(Cron),
}

/// Decides when the next session starts.
#[derive(Debug, Clone)]
pub struct RunScheduler {
    trigger: Trigger,
}

impl RunScheduler {
    pub fn interval(interval: Duration) -> Self {
        Self {
            trigger: Trigger::Interval(interval),
        }
    }

    pub fn cron(expression: &str) -> Result<Self> {
        let cron = parse_cron(expression)
            .map_err(|e| UpdateError::Config(format!("invalid schedule '{}': {}", expression, e)))?;
        Ok(Self {
            trigger: Trigger::Cron(cron),
        })
    }

    pub fn from_options(options: &UpdaterOptions) -> Result<Self> {
        match options.schedule.as_deref() {
            Some(expression) => Self::cron(expression),
            None => Ok(Self::interval(options.poll_interval)),
        }
    }

    /// Time from `now` until the next run. Cron schedules are evaluated in UTC.
    pub fn delay_from(&self, now: DateTime<Utc>) -> Result<Duration> {
        match &self.trigger {
            Trigger::Interval(interval) => Ok(*interval),
            Trigger::Cron(cron) => {
                let next = cron
                    .find_next_occurrence(&now, false)
                    .map_err(|e| UpdateError::Config(format!("no next occurrence: {}", e)))?;
                Ok((next - now).to_std().unwrap_or(Duration::ZERO))
            }
        }
    }

    /// Sleep until the next run. Returns `false` if cancelled first.
    pub async fn wait_for_next_run(&self, cancel: &CancellationToken) -> bool {
        let delay = match self.delay_from(Utc::now()) {
            Ok(delay) => delay,
            Err(e) => {
                info!("Scheduler has no further runs: {}", e);
                cancel.cancelled().await;
                return false;
            }
        };
        debug!("Next session in {:?}", delay);

        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}
