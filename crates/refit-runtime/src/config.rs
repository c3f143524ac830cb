use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_UNIX_SOCKET: &str = "unix:///var/run/docker.sock";

/// Runtime endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Endpoint URI, e.g. `unix:///var/run/docker.sock` or `tcp://10.0.0.5:2376`
    pub host: Option<String>,
    pub tls_verify: bool,
    pub cert_path: Option<String>,
    pub timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            host: None,
            tls_verify: false,
            cert_path: None,
            timeout: Duration::from_secs(120),
        }
    }
}

impl RuntimeConfig {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_tls(mut self, cert_path: Option<String>) -> Self {
        self.tls_verify = true;
        self.cert_path = cert_path;
        self
    }

    /// Get effective endpoint for the runtime
    pub fn effective_host(&self) -> String {
        self.host
            .clone()
            .unwrap_or_else(|| DEFAULT_UNIX_SOCKET.to_string())
    }

    /// Timeout in whole seconds, as the Docker client expects
    pub fn timeout_secs(&self) -> u64 {
        self.timeout.as_secs().max(1)
    }
}
