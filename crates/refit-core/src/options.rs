use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use refit_runtime::{normalize_container_name, RuntimeConfig};

/// Environment variable names understood by refit
pub mod env_names {
    pub const DOCKER_HOST: &str = "DOCKER_HOST";
    pub const DOCKER_TLS_VERIFY: &str = "DOCKER_TLS_VERIFY";
    pub const DOCKER_CERT_PATH: &str = "DOCKER_CERT_PATH";
    pub const DOCKER_CONFIG: &str = "DOCKER_CONFIG";
    pub const POLL_INTERVAL: &str = "REFIT_POLL_INTERVAL";
    pub const SCHEDULE: &str = "REFIT_SCHEDULE";
    pub const LABEL_ENABLE: &str = "REFIT_LABEL_ENABLE";
    pub const DISABLE_CONTAINERS: &str = "REFIT_DISABLE_CONTAINERS";
    pub const CLEANUP: &str = "REFIT_CLEANUP";
    pub const TIMEOUT: &str = "REFIT_TIMEOUT";
    pub const RUN_ONCE: &str = "REFIT_RUN_ONCE";
    pub const SELF_UPDATE: &str = "REFIT_SELF_UPDATE";
    pub const INCLUDE_STOPPED: &str = "REFIT_INCLUDE_STOPPED";
    pub const REVIVE_STOPPED: &str = "REFIT_REVIVE_STOPPED";
    pub const CONTAINERS: &str = "REFIT_CONTAINERS";
    pub const NOTIFICATION_URL: &str = "REFIT_NOTIFICATION_URL";
    pub const DISCORD_WEBHOOK_URL: &str = "REFIT_DISCORD_WEBHOOK_URL";
    pub const DISCORD_MESSAGE_TEMPLATE: &str = "REFIT_DISCORD_MESSAGE_TEMPLATE";
    pub const DATA_DIR: &str = "REFIT_DATA_DIR";
}

/// Label that opts a container in or out of monitoring
pub const LABEL_ENABLE: &str = "io.refit.enable";

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 86_400;
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_DATA_DIR: &str = "/var/lib/refit";

/// Case-insensitive set of normalized container names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameSet(HashSet<String>);

impl NameSet {
    /// Parse a comma/space separated list of container names.
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split([',', ' '])
                .map(normalize_container_name)
                .filter(|name| !name.is_empty())
                .map(|name| name.to_lowercase())
                .collect(),
        )
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(&normalize_container_name(name).to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Names joined with commas, sorted for stable output
    pub fn to_list_string(&self) -> String {
        let mut names: Vec<&str> = self.0.iter().map(String::as_str).collect();
        names.sort_unstable();
        names.join(",")
    }
}

impl<S: AsRef<str>> FromIterator<S> for NameSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|name| normalize_container_name(name.as_ref()).to_lowercase())
                .filter(|name| !name.is_empty())
                .collect(),
        )
    }
}

/// Fully resolved updater configuration
#[derive(Debug, Clone)]
pub struct UpdaterOptions {
    pub runtime: RuntimeConfig,
    pub poll_interval: Duration,
    pub poll_interval_explicit: bool,
    pub schedule: Option<String>,
    pub label_enable: bool,
    pub disable_containers: NameSet,
    pub target_containers: NameSet,
    pub cleanup: bool,
    pub stop_timeout: Duration,
    pub run_once: bool,
    pub self_update: bool,
    pub include_stopped: bool,
    pub revive_stopped: bool,
    pub notification_url: Option<String>,
    pub discord_webhook_url: Option<String>,
    pub discord_message_template: Option<String>,
    pub data_dir: PathBuf,
    /// Id of the container this process runs in, if any
    pub own_container_id: Option<String>,
}

impl Default for UpdaterOptions {
    fn default() -> Self {
        Self {
            runtime: RuntimeConfig::default(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            poll_interval_explicit: false,
            schedule: None,
            label_enable: false,
            disable_containers: NameSet::default(),
            target_containers: NameSet::default(),
            cleanup: false,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            run_once: false,
            self_update: false,
            include_stopped: false,
            revive_stopped: false,
            notification_url: None,
            discord_webhook_url: None,
            discord_message_template: None,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            own_container_id: None,
        }
    }
}

impl UpdaterOptions {
    /// Collect every configuration problem instead of stopping at the first.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.schedule.is_some() && self.poll_interval_explicit {
            errors.push(format!(
                "{} cannot be used with {}.",
                env_names::SCHEDULE,
                env_names::POLL_INTERVAL
            ));
        }

        if let Some(schedule) = &self.schedule {
            if crate::schedule::parse_cron(schedule).is_err() {
                errors.push(format!(
                    "{} is not a valid six-field cron expression.",
                    env_names::SCHEDULE
                ));
            }
        }

        if self.revive_stopped && !self.include_stopped {
            errors.push(format!(
                "{} requires {}=true.",
                env_names::REVIVE_STOPPED,
                env_names::INCLUDE_STOPPED
            ));
        }

        if self.poll_interval.is_zero() {
            errors.push(format!("{} must be greater than zero.", env_names::POLL_INTERVAL));
        }

        if self.stop_timeout.is_zero() {
            errors.push(format!("{} must be greater than zero.", env_names::TIMEOUT));
        }

        errors
    }
}

/// Parse a boolean the way the environment usually spells it.
pub fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("invalid boolean '{}'", other)),
    }
}

/// Parse `10s`, `5m`, `1h` or a bare number of seconds.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let trimmed = value.trim();
    let (digits, multiplier) = match trimmed.chars().last() {
        Some('s') => (&trimmed[..trimmed.len() - 1], 1),
        Some('m') => (&trimmed[..trimmed.len() - 1], 60),
        Some('h') => (&trimmed[..trimmed.len() - 1], 3600),
        _ => (trimmed, 1),
    };

    digits
        .trim()
        .parse::<u64>()
        .map(|n| Duration::from_secs(n * multiplier))
        .map_err(|_| format!("invalid duration '{}'", value))
}
