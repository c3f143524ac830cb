//! Session notifications.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, UpdateError};
use crate::options::UpdaterOptions;
use crate::session::{ContainerUpdateState, UpdateSessionResult};

const HEADER: &str = "Refit session finished.";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Receives the result of every finished session. Implementations deal with
/// their own failures.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_session(&self, session: &UpdateSessionResult);
}

/// Render a session summary, optionally through a template using
/// `{scanned}`, `{updated}`, `{failed}` and `{details}`.
pub fn compose_message(session: &UpdateSessionResult, template: Option<&str>) -> String {
    let mut details = String::new();
    for result in &session.results {
        if !matches!(
            result.state,
            ContainerUpdateState::Updated | ContainerUpdateState::Failed
        ) {
            continue;
        }
        let _ = write!(details, "- {}: {}", result.name, result.state);
        if let Some(error) = result.error.as_deref().filter(|e| !e.trim().is_empty()) {
            let _ = write!(details, " ({})", error);
        }
        details.push('\n');
    }

    match template.filter(|t| !t.trim().is_empty()) {
        Some(template) => template
            .replace("{scanned}", &session.scanned().to_string())
            .replace("{updated}", &session.updated().to_string())
            .replace("{failed}", &session.failed().to_string())
            .replace("{details}", details.trim_end()),
        None => format!(
            "{}\nScanned: {}, Updated: {}, Failed: {}\n{}",
            HEADER,
            session.scanned(),
            session.updated(),
            session.failed(),
            details
        ),
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

/// Posts `{"content": ...}` to a Discord-compatible webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    template: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, template: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| UpdateError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            template,
        })
    }

    /// Discord webhook if set, otherwise the generic URL when it is https.
    pub fn resolve_url(options: &UpdaterOptions) -> Option<String> {
        let non_blank = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        non_blank(&options.discord_webhook_url).or_else(|| {
            non_blank(&options.notification_url)
                .filter(|url| url.to_ascii_lowercase().starts_with("https://"))
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_session(&self, session: &UpdateSessionResult) {
        let content = compose_message(session, self.template.as_deref());
        let payload = WebhookPayload { content: &content };

        match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("Webhook notification delivered");
            }
            Ok(response) => {
                warn!("Webhook notification failed with status code {}", response.status());
            }
            Err(e) => warn!("Webhook notification failed: {}", e),
        }
    }
}

/// Fans a session out to several notifiers, one after another.
#[derive(Default)]
pub struct CompositeNotifier {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl CompositeNotifier {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    /// Everything `options` configures; empty when nothing is.
    pub fn from_options(options: &UpdaterOptions) -> Result<Self> {
        let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();

        if let Some(url) = WebhookNotifier::resolve_url(options) {
            notifiers.push(Box::new(WebhookNotifier::new(
                url,
                options.discord_message_template.clone(),
            )?));
        } else if options.notification_url.is_some() {
            warn!("Notification URL ignored: only https:// webhook URLs are supported");
        }

        Ok(Self::new(notifiers))
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }
}

#[async_trait]
impl Notifier for CompositeNotifier {
    async fn notify_session(&self, session: &UpdateSessionResult) {
        for notifier in &self.notifiers {
            notifier.notify_session(session).await;
        }
    }
}

/// Used when no notification channel is configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify_session(&self, _session: &UpdateSessionResult) {}
}
