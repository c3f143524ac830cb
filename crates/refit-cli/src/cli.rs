use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use refit_core::options::parse_duration;

#[derive(Parser, Debug)]
#[command(
    name = "refit",
    about = "Keeps running containers on their latest image",
    version = env!("CARGO_PKG_VERSION"),
    long_about = "Watches containers on a Docker endpoint, pulls their images on a schedule and \
                  recreates containers whose image changed, with crash-safe rollback."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress log output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub updater: UpdaterArgs,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Recover interrupted recreations, then update on schedule (default)
    Run,

    /// Resolve interrupted recreations from the journal and exit
    Recover,

    /// Print pending journal entries as JSON
    Journal,

    /// Validate configuration and print the effective settings
    Check,
}

/// Updater settings. Every flag can also be given through its environment variable.
#[derive(Args, Debug, Clone)]
pub struct UpdaterArgs {
    /// Docker endpoint (unix://, tcp://, http://, https://)
    #[arg(long, env = "DOCKER_HOST", value_name = "URI")]
    pub docker_host: Option<String>,

    /// Use TLS for a remote endpoint
    #[arg(long, env = "DOCKER_TLS_VERIFY", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    pub tls_verify: bool,

    /// Directory holding ca.pem, cert.pem and key.pem
    #[arg(long, env = "DOCKER_CERT_PATH", value_name = "DIR")]
    pub cert_path: Option<String>,

    /// Time between sessions (e.g. 300, 30s, 5m, 24h)
    #[arg(long, env = "REFIT_POLL_INTERVAL", value_parser = parse_duration, value_name = "DURATION")]
    pub poll_interval: Option<Duration>,

    /// Six-field cron expression (seconds first), evaluated in UTC
    #[arg(long, env = "REFIT_SCHEDULE", value_name = "CRON")]
    pub schedule: Option<String>,

    /// Only monitor containers labelled io.refit.enable=true
    #[arg(long, env = "REFIT_LABEL_ENABLE", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    pub label_enable: bool,

    /// Containers never to update (comma or space separated)
    #[arg(long, env = "REFIT_DISABLE_CONTAINERS", value_name = "NAMES")]
    pub disable_containers: Option<String>,

    /// Only update these containers (comma or space separated)
    #[arg(long, env = "REFIT_CONTAINERS", value_name = "NAMES")]
    pub containers: Option<String>,

    /// Remove the previous image after a successful update
    #[arg(long, env = "REFIT_CLEANUP", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    pub cleanup: bool,

    /// Grace period when stopping a container
    #[arg(long, env = "REFIT_TIMEOUT", value_parser = parse_duration, default_value = "10s", value_name = "DURATION")]
    pub timeout: Duration,

    /// Run a single session and exit
    #[arg(long, env = "REFIT_RUN_ONCE", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    pub run_once: bool,

    /// Update refit's own container through a helper container
    #[arg(long, env = "REFIT_SELF_UPDATE", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    pub self_update: bool,

    /// Also consider stopped containers
    #[arg(long, env = "REFIT_INCLUDE_STOPPED", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    pub include_stopped: bool,

    /// Start stopped containers after updating them
    #[arg(long, env = "REFIT_REVIVE_STOPPED", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    pub revive_stopped: bool,

    /// Generic https webhook for session reports
    #[arg(long, env = "REFIT_NOTIFICATION_URL", value_name = "URL")]
    pub notification_url: Option<String>,

    /// Discord webhook for session reports
    #[arg(long, env = "REFIT_DISCORD_WEBHOOK_URL", value_name = "URL")]
    pub discord_webhook_url: Option<String>,

    /// Message template ({scanned}, {updated}, {failed}, {details})
    #[arg(long, env = "REFIT_DISCORD_MESSAGE_TEMPLATE", value_name = "TEMPLATE")]
    pub discord_message_template: Option<String>,

    /// Directory for the recovery journal
    #[arg(long, env = "REFIT_DATA_DIR", default_value = "/var/lib/refit", value_name = "DIR")]
    pub data_dir: PathBuf,
}
