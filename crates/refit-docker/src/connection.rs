//! Docker client construction from a [`RuntimeConfig`].

use bollard::{Docker, API_DEFAULT_VERSION};
use refit_runtime::RuntimeConfig;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{DockerError, Result};

/// Where the Docker API lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Platform default socket / named pipe
    Local,
    Unix(String),
    Http(String),
}

pub fn parse_endpoint(host: Option<&str>) -> Result<Endpoint> {
    let host = match host.map(str::trim) {
        None | Some("") => return Ok(Endpoint::Local),
        Some(host) => host,
    };

    if host.starts_with("unix://") {
        Ok(Endpoint::Unix(host.to_string()))
    } else if host.starts_with("tcp://") || host.starts_with("http://") || host.starts_with("https://") {
        Ok(Endpoint::Http(host.to_string()))
    } else {
        Err(DockerError::InvalidHost(host.to_string()))
    }
}

/// Connect to the configured Docker endpoint
pub fn connect(config: &RuntimeConfig) -> Result<Docker> {
    let endpoint = parse_endpoint(config.host.as_deref())?;
    let timeout = config.timeout_secs();
    info!("Connecting to Docker host: {}", config.effective_host());

    let docker = match endpoint {
        Endpoint::Local if config.tls_verify => Docker::connect_with_ssl_defaults(),
        Endpoint::Local => Docker::connect_with_local_defaults(),
        Endpoint::Unix(path) => Docker::connect_with_unix(&path, timeout, API_DEFAULT_VERSION),
        Endpoint::Http(addr) if config.tls_verify => match config.cert_path.as_deref() {
            Some(cert_path) => {
                let dir = Path::new(cert_path);
                info!("Using TLS certificates from {}", cert_path);
                Docker::connect_with_ssl(
                    &addr,
                    &dir.join("key.pem"),
                    &dir.join("cert.pem"),
                    &dir.join("ca.pem"),
                    timeout,
                    API_DEFAULT_VERSION,
                )
            }
            None => {
                warn!("DOCKER_TLS_VERIFY is enabled but DOCKER_CERT_PATH is not set. Using default certificate location");
                Docker::connect_with_ssl_defaults()
            }
        },
        Endpoint::Http(addr) => Docker::connect_with_http(&addr, timeout, API_DEFAULT_VERSION),
    }
    .map_err(|e| DockerError::ConnectionError(format!("Failed to connect to Docker: {}", e)))?;

    Ok(docker.with_timeout(config.timeout))
}
