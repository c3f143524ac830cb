use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Strip whitespace and the leading `/` the Docker API puts in front of names.
pub fn normalize_container_name(name: &str) -> String {
    name.trim().trim_start_matches('/').to_string()
}

/// Snapshot of a container as seen from a listing call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerRef {
    pub id: String,
    /// Normalized name (no leading `/`)
    pub name: String,
    /// Image reference as configured, e.g. `repo:tag`
    pub image: String,
    /// Content identifier of the image currently in use
    pub image_id: String,
    pub labels: HashMap<String, String>,
    /// Lifecycle indicator, e.g. running/exited/created
    pub state: String,
}

impl ContainerRef {
    pub fn is_running(&self) -> bool {
        self.state.eq_ignore_ascii_case("running")
    }

    pub fn is_stopped(&self) -> bool {
        self.state.eq_ignore_ascii_case("exited") || self.state.eq_ignore_ascii_case("created")
    }
}

/// IP assignment requested for a network endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpamConfig {
    pub ipv4_address: Option<String>,
    pub ipv6_address: Option<String>,
    pub link_local_ips: Option<Vec<String>>,
}

/// Per-network endpoint configuration of a container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointSettings {
    pub aliases: Option<Vec<String>>,
    pub network_id: Option<String>,
    pub ipam_config: Option<IpamConfig>,
    pub ip_address: Option<String>,
    pub gateway: Option<String>,
    pub global_ipv6_address: Option<String>,
    pub ipv6_gateway: Option<String>,
    pub mac_address: Option<String>,
}

/// Full inspection result for a single container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerDetails {
    pub id: String,
    pub name: String,
    pub image: String,
    pub image_id: String,
    pub running: bool,
    pub status: String,
    pub env: Option<Vec<String>>,
    pub cmd: Option<Vec<String>>,
    pub entrypoint: Option<Vec<String>>,
    pub working_dir: Option<String>,
    pub labels: Option<HashMap<String, String>>,
    pub exposed_ports: Option<Vec<String>>,
    /// Host configuration document (resource limits, mounts, restart policy,
    /// network mode, ...) kept in the runtime's own wire shape.
    pub host_config: Option<serde_json::Value>,
    pub networks: HashMap<String, EndpointSettings>,
}

impl ContainerDetails {
    /// Look up `KEY=value` in the container environment, matching the key
    /// case-insensitively.
    pub fn env_entry(&self, key: &str) -> Option<&str> {
        let prefix_len = key.len() + 1;
        self.env.as_ref()?.iter().map(String::as_str).find(|entry| {
            entry.len() >= prefix_len
                && entry.as_bytes()[key.len()] == b'='
                && entry[..key.len()].eq_ignore_ascii_case(key)
        })
    }
}

/// Container specification for creation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub env: Option<Vec<String>>,
    pub cmd: Option<Vec<String>>,
    pub entrypoint: Option<Vec<String>>,
    pub working_dir: Option<String>,
    pub labels: Option<HashMap<String, String>>,
    pub exposed_ports: Option<Vec<String>>,
    pub host_config: Option<serde_json::Value>,
    pub networks: Option<HashMap<String, EndpointSettings>>,
}

/// Image information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub id: String,
    pub reference: String,
}

/// Credentials handed to the runtime for a registry pull
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryCredentials {
    pub server_address: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub identity_token: Option<String>,
}

impl std::fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("server_address", &self.server_address)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("identity_token", &self.identity_token.as_ref().map(|_| "***"))
            .finish()
    }
}
