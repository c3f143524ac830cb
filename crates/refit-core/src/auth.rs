//! Registry credentials from the Docker CLI config file.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use refit_runtime::{ImageReference, RegistryCredentials};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::options::env_names;

const DOCKER_HUB_AUTH_KEY: &str = "https://index.docker.io/v1/";

/// Looks up pull credentials in `config.json`.
///
/// The file is read once, on first use, and cached for the process lifetime.
#[derive(Debug)]
pub struct RegistryAuthResolver {
    config_path: Option<PathBuf>,
    config: OnceLock<Option<Value>>,
}

impl RegistryAuthResolver {
    /// `$DOCKER_CONFIG/config.json`, falling back to `~/.docker/config.json`.
    pub fn from_env() -> Self {
        let config_dir = std::env::var(env_names::DOCKER_CONFIG)
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(".docker")));

        Self::with_config_path(config_dir.map(|dir| dir.join("config.json")))
    }

    pub fn with_config_dir(dir: impl AsRef<Path>) -> Self {
        Self::with_config_path(Some(dir.as_ref().join("config.json")))
    }

    /// Resolver that never returns credentials
    pub fn disabled() -> Self {
        Self::with_config_path(None)
    }

    fn with_config_path(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path,
            config: OnceLock::new(),
        }
    }

    pub fn resolve_for_image(&self, image_name: &str) -> Option<RegistryCredentials> {
        let registry = ImageReference::parse(image_name).registry;
        let auths = self.config()?.get("auths")?.as_object()?;

        let credentials = lookup_candidates(&registry)
            .iter()
            .filter_map(|key| auths.get(key))
            .filter(|entry| entry.is_object())
            .find_map(|entry| parse_auth_entry(entry, &registry));

        if credentials.is_some() {
            debug!("Using stored credentials for registry {}", registry);
        }
        credentials
    }

    fn config(&self) -> Option<&Value> {
        self.config
            .get_or_init(|| self.load_config())
            .as_ref()
    }

    fn load_config(&self) -> Option<Value> {
        let path = self.config_path.as_ref()?;
        let contents = fs::read_to_string(path).ok()?;

        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(
                    "Failed parsing Docker auth config {}: {}. Pulling anonymously",
                    path.display(),
                    e
                );
                None
            }
        }
    }
}

fn lookup_candidates(registry: &str) -> Vec<String> {
    let mut candidates = Vec::with_capacity(6);
    if registry.eq_ignore_ascii_case("index.docker.io") || registry.eq_ignore_ascii_case("docker.io") {
        candidates.push(DOCKER_HUB_AUTH_KEY.to_string());
        candidates.push("docker.io".to_string());
        candidates.push("index.docker.io".to_string());
    }
    candidates.push(registry.to_string());
    candidates.push(format!("https://{}", registry));
    candidates.push(format!("https://{}/v1/", registry));
    candidates
}

fn parse_auth_entry(entry: &Value, registry: &str) -> Option<RegistryCredentials> {
    let field = |name: &str| {
        entry
            .get(name)
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
            .map(str::to_string)
    };

    let identity_token = field("identitytoken").or_else(|| field("identityToken"));
    let mut username = field("username");
    let mut password = field("password");

    if username.is_none() || password.is_none() {
        if let Some((user, pass)) = field("auth").as_deref().and_then(decode_auth) {
            username = Some(user);
            password = Some(pass);
        }
    }

    if identity_token.is_none() && (username.is_none() || password.is_none()) {
        return None;
    }

    Some(RegistryCredentials {
        server_address: registry.to_string(),
        username,
        password,
        identity_token,
    })
}

/// Decode the base64 `user:password` form.
fn decode_auth(encoded: &str) -> Option<(String, String)> {
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;

    if user.trim().is_empty() || pass.is_empty() {
        return None;
    }
    Some((user.to_string(), pass.to_string()))
}
