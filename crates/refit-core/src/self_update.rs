//! Updating the container refit itself runs in.
//!
//! A process cannot recreate its own container, so it starts a short-lived
//! helper from the new image that updates only the original updater
//! container and then removes itself.

use refit_runtime::{normalize_container_name, ContainerDetails, ContainerRef, ContainerRuntime, ContainerSpec};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::error::{Result, UpdateError};
use crate::options::{env_names, UpdaterOptions, LABEL_ENABLE};

pub const HELPER_PREFIX: &str = "refit-self-update-";

/// Variables copied from the updater's own environment into the helper
const PROPAGATED_ENV: &[&str] = &[
    env_names::DOCKER_HOST,
    env_names::DOCKER_TLS_VERIFY,
    env_names::DOCKER_CERT_PATH,
    env_names::DOCKER_CONFIG,
    env_names::NOTIFICATION_URL,
    env_names::DISCORD_WEBHOOK_URL,
    env_names::DISCORD_MESSAGE_TEMPLATE,
];

#[derive(Debug, Clone)]
pub struct SelfUpdateLauncher {
    own_container_id: Option<String>,
    cleanup: bool,
    stop_timeout: Duration,
}

impl SelfUpdateLauncher {
    pub fn new(options: &UpdaterOptions) -> Self {
        Self {
            own_container_id: options
                .own_container_id
                .clone()
                .filter(|id| !id.trim().is_empty()),
            cleanup: options.cleanup,
            stop_timeout: options.stop_timeout,
        }
    }

    /// Whether `container_id` is the container this process runs in.
    /// Short and full ids match each other.
    pub fn is_self(&self, container_id: &str) -> bool {
        let Some(own_id) = self.own_container_id.as_deref() else {
            return false;
        };
        let own_id = own_id.to_ascii_lowercase();
        let container_id = container_id.to_ascii_lowercase();
        !container_id.is_empty()
            && (container_id.starts_with(&own_id) || own_id.starts_with(&container_id))
    }

    /// Create and start the helper. Returns the helper container id.
    pub async fn launch_helper(
        &self,
        runtime: &dyn ContainerRuntime,
        own_container: &ContainerRef,
        new_image: &str,
    ) -> Result<String> {
        let details = runtime.inspect_container(&own_container.id).await?;
        let helper_name = helper_name();
        let spec = self.helper_spec(&details, &helper_name, new_image);
        let updater_name = own_name(&details);

        let helper_id = runtime.create_container(spec).await?;
        if !runtime.start_container(&helper_id).await? {
            return Err(UpdateError::SelfUpdate(format!(
                "Failed to start self-update helper container '{}'",
                helper_name
            )));
        }

        info!(
            "Launched self-update helper container {} ({}) to update {}",
            helper_name,
            helper_id.get(..12).unwrap_or(&helper_id),
            updater_name
        );
        Ok(helper_id)
    }

    fn helper_spec(&self, own: &ContainerDetails, helper_name: &str, new_image: &str) -> ContainerSpec {
        let mut env = vec![
            format!("{}=true", env_names::RUN_ONCE),
            format!("{}={}", env_names::CONTAINERS, own_name(own)),
            format!("{}=false", env_names::LABEL_ENABLE),
            format!("{}={}", env_names::CLEANUP, self.cleanup),
            format!("{}={}s", env_names::TIMEOUT, self.stop_timeout.as_secs()),
        ];
        env.extend(
            PROPAGATED_ENV
                .iter()
                .filter_map(|key| own.env_entry(key))
                .map(str::to_string),
        );

        let mut host_config = Map::new();
        host_config.insert("AutoRemove".to_string(), Value::Bool(true));
        if let Some(own_host) = own.host_config.as_ref() {
            for key in ["Binds", "NetworkMode"] {
                if let Some(value) = own_host.get(key).filter(|v| !v.is_null()) {
                    host_config.insert(key.to_string(), value.clone());
                }
            }
        }

        ContainerSpec {
            name: helper_name.to_string(),
            image: new_image.to_string(),
            env: Some(env),
            labels: Some(HashMap::from([(LABEL_ENABLE.to_string(), "false".to_string())])),
            host_config: Some(Value::Object(host_config)),
            ..Default::default()
        }
    }
}

fn helper_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}{}", HELPER_PREFIX, &id[..8])
}

fn own_name(own: &ContainerDetails) -> String {
    normalize_container_name(&own.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use refit_runtime::InMemoryRuntime;
    use serde_json::json;

    fn launcher(own_id: Option<&str>) -> SelfUpdateLauncher {
        SelfUpdateLauncher::new(&UpdaterOptions {
            own_container_id: own_id.map(str::to_string),
            cleanup: true,
            stop_timeout: Duration::from_secs(30),
            ..Default::default()
        })
    }

    #[test]
    fn test_is_self_matches_short_and_full_ids() {
        let launcher = launcher(Some("ABCDEF123456"));
        assert!(launcher.is_self("abcdef1234567890abcdef"));
        assert!(launcher.is_self("abcdef"));
        assert!(!launcher.is_self("123456abcdef"));
        assert!(!launcher.is_self(""));
        assert!(!self::launcher(None).is_self("abcdef"));
        assert!(!self::launcher(Some("  ")).is_self("abcdef"));
    }

    #[test]
    fn test_helper_name_format() {
        let name = helper_name();
        assert!(name.starts_with(HELPER_PREFIX));
        let suffix = &name[HELPER_PREFIX.len()..];
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_launch_helper_builds_single_shot_updater() {
        let runtime = InMemoryRuntime::new();
        let own_id = runtime.add_container(ContainerDetails {
            name: "/refit".into(),
            image: "refit:1".into(),
            running: true,
            env: Some(vec![
                "DOCKER_HOST=tcp://docker:2376".into(),
                "REFIT_DISCORD_WEBHOOK_URL=https://discord.example/hook".into(),
                "UNRELATED=1".into(),
            ]),
            host_config: Some(json!({
                "Binds": ["/var/run/docker.sock:/var/run/docker.sock"],
                "NetworkMode": "bridge",
                "Memory": 1024
            })),
            ..Default::default()
        });
        let own = ContainerRef {
            id: own_id,
            name: "refit".into(),
            image: "refit:1".into(),
            image_id: "sha256:old".into(),
            labels: HashMap::new(),
            state: "running".into(),
        };

        let helper_id = launcher(None)
            .launch_helper(&runtime, &own, "refit:2")
            .await
            .unwrap();

        let helper = runtime.container(&helper_id).unwrap();
        assert!(helper.running);
        assert!(helper.name.starts_with(HELPER_PREFIX));

        let spec = runtime.created_specs().remove(0);
        assert_eq!(spec.image, "refit:2");
        let env = spec.env.unwrap();
        assert!(env.contains(&"REFIT_RUN_ONCE=true".to_string()));
        assert!(env.contains(&"REFIT_CONTAINERS=refit".to_string()));
        assert!(env.contains(&"REFIT_LABEL_ENABLE=false".to_string()));
        assert!(env.contains(&"REFIT_CLEANUP=true".to_string()));
        assert!(env.contains(&"REFIT_TIMEOUT=30s".to_string()));
        assert!(env.contains(&"DOCKER_HOST=tcp://docker:2376".to_string()));
        assert!(env.contains(&"REFIT_DISCORD_WEBHOOK_URL=https://discord.example/hook".to_string()));
        assert!(!env.iter().any(|e| e.starts_with("UNRELATED")));

        assert_eq!(
            spec.host_config.unwrap(),
            json!({
                "AutoRemove": true,
                "Binds": ["/var/run/docker.sock:/var/run/docker.sock"],
                "NetworkMode": "bridge"
            })
        );
        assert_eq!(spec.labels.unwrap()[LABEL_ENABLE], "false");
    }

    #[tokio::test]
    async fn test_refused_start_is_an_error() {
        let runtime = InMemoryRuntime::new();
        let own_id = runtime.add_simple_container("refit", "refit:1", true);
        let own = ContainerRef {
            id: own_id,
            name: "refit".into(),
            image: "refit:1".into(),
            image_id: String::new(),
            labels: HashMap::new(),
            state: "running".into(),
        };
        runtime.refuse_next_start();

        let err = launcher(None)
            .launch_helper(&runtime, &own, "refit:2")
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::SelfUpdate(_)));
    }
}
