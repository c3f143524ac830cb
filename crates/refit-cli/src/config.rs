use std::time::Duration;

use refit_core::options::{NameSet, UpdaterOptions, DEFAULT_POLL_INTERVAL_SECS};
use refit_runtime::RuntimeConfig;

use crate::cli::UpdaterArgs;
use crate::error::{CliError, Result};

/// Variable the container runtime sets to the container's short id
const HOSTNAME_ENV: &str = "HOSTNAME";

impl UpdaterArgs {
    /// Resolve the arguments into options, given the id of the container
    /// this process runs in (if any).
    pub fn to_options(&self, own_container_id: Option<String>) -> UpdaterOptions {
        let runtime = RuntimeConfig {
            host: non_blank(self.docker_host.as_deref()),
            tls_verify: self.tls_verify,
            cert_path: non_blank(self.cert_path.as_deref()),
            ..Default::default()
        };

        UpdaterOptions {
            runtime,
            poll_interval: self
                .poll_interval
                .unwrap_or(Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)),
            poll_interval_explicit: self.poll_interval.is_some(),
            schedule: non_blank(self.schedule.as_deref()),
            label_enable: self.label_enable,
            disable_containers: self
                .disable_containers
                .as_deref()
                .map(NameSet::parse)
                .unwrap_or_default(),
            target_containers: self
                .containers
                .as_deref()
                .map(NameSet::parse)
                .unwrap_or_default(),
            cleanup: self.cleanup,
            stop_timeout: self.timeout,
            run_once: self.run_once,
            self_update: self.self_update,
            include_stopped: self.include_stopped,
            revive_stopped: self.revive_stopped,
            notification_url: non_blank(self.notification_url.as_deref()),
            discord_webhook_url: non_blank(self.discord_webhook_url.as_deref()),
            discord_message_template: non_blank(self.discord_message_template.as_deref()),
            data_dir: self.data_dir.clone(),
            own_container_id: own_container_id.and_then(|id| non_blank(Some(&id))),
        }
    }

    /// Options from the arguments and the process environment, validated.
    pub fn load(&self) -> Result<UpdaterOptions> {
        let options = self.to_options(std::env::var(HOSTNAME_ENV).ok());
        let errors = options.validate();
        if errors.is_empty() {
            Ok(options)
        } else {
            Err(CliError::InvalidConfiguration(errors))
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Human-readable summary of the effective settings, secrets masked.
pub fn describe(options: &UpdaterOptions) -> Vec<(&'static str, String)> {
    let on_off = |flag: bool| if flag { "on" } else { "off" }.to_string();
    let masked = |value: &Option<String>| match value {
        Some(_) => "(set)".to_string(),
        None => "-".to_string(),
    };
    let list = |names: &NameSet| {
        if names.is_empty() {
            "-".to_string()
        } else {
            names.to_list_string()
        }
    };

    vec![
        ("Docker endpoint", options.runtime.effective_host()),
        ("TLS", on_off(options.runtime.tls_verify)),
        (
            "Schedule",
            match &options.schedule {
                Some(cron) => format!("cron '{}' (UTC)", cron),
                None => format!("every {}s", options.poll_interval.as_secs()),
            },
        ),
        ("Label opt-in", on_off(options.label_enable)),
        ("Only containers", list(&options.target_containers)),
        ("Disabled containers", list(&options.disable_containers)),
        ("Include stopped", on_off(options.include_stopped)),
        ("Revive stopped", on_off(options.revive_stopped)),
        ("Cleanup", on_off(options.cleanup)),
        ("Stop timeout", format!("{}s", options.stop_timeout.as_secs())),
        ("Run once", on_off(options.run_once)),
        ("Self update", on_off(options.self_update)),
        ("Notification URL", masked(&options.notification_url)),
        ("Discord webhook", masked(&options.discord_webhook_url)),
        ("Data directory", options.data_dir.display().to_string()),
    ]
}
