//! Conversions between bollard models and runtime-neutral types.

use bollard::container::{Config, NetworkingConfig};
use bollard::models::{
    ContainerInspectResponse, ContainerSummary, EndpointIpamConfig,
    EndpointSettings as DockerEndpointSettings, HostConfig,
};
use refit_runtime::{
    normalize_container_name, ContainerDetails, ContainerRef, ContainerSpec, EndpointSettings,
    IpamConfig, Result,
};
use std::collections::HashMap;

pub fn summary_to_ref(summary: ContainerSummary) -> ContainerRef {
    let id = summary.id.unwrap_or_default();
    let name = summary
        .names
        .and_then(|names| names.into_iter().next())
        .unwrap_or_else(|| id.chars().take(12).collect());

    ContainerRef {
        name: normalize_container_name(&name),
        image: summary.image.unwrap_or_default(),
        image_id: summary.image_id.unwrap_or_default(),
        labels: summary.labels.unwrap_or_default(),
        state: summary.state.unwrap_or_default(),
        id,
    }
}

pub fn inspect_to_details(inspect: ContainerInspectResponse) -> Result<ContainerDetails> {
    let state = inspect.state.unwrap_or_default();
    let config = inspect.config.unwrap_or_default();
    let host_config = inspect
        .host_config
        .map(|host_config| serde_json::to_value(&host_config))
        .transpose()?;
    let networks = inspect
        .network_settings
        .and_then(|settings| settings.networks)
        .unwrap_or_default()
        .iter()
        .map(|(network, endpoint)| (network.clone(), endpoint_from_docker(endpoint)))
        .collect();

    Ok(ContainerDetails {
        id: inspect.id.unwrap_or_default(),
        name: normalize_container_name(inspect.name.as_deref().unwrap_or_default()),
        image: config.image.unwrap_or_default(),
        image_id: inspect.image.unwrap_or_default(),
        running: state.running.unwrap_or(false),
        status: state.status.map(|s| s.to_string()).unwrap_or_default(),
        env: config.env,
        cmd: config.cmd,
        entrypoint: config.entrypoint,
        working_dir: config.working_dir,
        labels: config.labels,
        exposed_ports: config
            .exposed_ports
            .map(|ports| ports.into_keys().collect()),
        host_config,
        networks,
    })
}

pub fn spec_to_config(spec: ContainerSpec) -> Result<Config<String>> {
    let host_config = spec
        .host_config
        .map(serde_json::from_value::<HostConfig>)
        .transpose()?;
    let networking_config = spec.networks.map(|networks| NetworkingConfig {
        endpoints_config: networks
            .into_iter()
            .map(|(network, endpoint)| (network, endpoint_to_docker(endpoint)))
            .collect(),
    });

    Ok(Config {
        image: Some(spec.image),
        env: spec.env,
        cmd: spec.cmd,
        entrypoint: spec.entrypoint,
        working_dir: spec.working_dir,
        labels: spec.labels,
        exposed_ports: spec.exposed_ports.map(|ports| {
            ports
                .into_iter()
                .map(|port| (port, HashMap::new()))
                .collect()
        }),
        host_config,
        networking_config,
        ..Default::default()
    })
}

pub fn endpoint_from_docker(endpoint: &DockerEndpointSettings) -> EndpointSettings {
    EndpointSettings {
        aliases: endpoint.aliases.clone(),
        network_id: endpoint.network_id.clone(),
        ipam_config: endpoint.ipam_config.as_ref().map(|ipam| IpamConfig {
            ipv4_address: ipam.ipv4_address.clone(),
            ipv6_address: ipam.ipv6_address.clone(),
            link_local_ips: ipam.link_local_ips.clone(),
        }),
        ip_address: endpoint.ip_address.clone(),
        gateway: endpoint.gateway.clone(),
        global_ipv6_address: endpoint.global_ipv6_address.clone(),
        ipv6_gateway: endpoint.ipv6_gateway.clone(),
        mac_address: endpoint.mac_address.clone(),
    }
}

pub fn endpoint_to_docker(endpoint: EndpointSettings) -> DockerEndpointSettings {
    DockerEndpointSettings {
        aliases: endpoint.aliases,
        network_id: endpoint.network_id,
        ipam_config: endpoint.ipam_config.map(|ipam| EndpointIpamConfig {
            ipv4_address: ipam.ipv4_address,
            ipv6_address: ipam.ipv6_address,
            link_local_ips: ipam.link_local_ips,
        }),
        ip_address: endpoint.ip_address,
        gateway: endpoint.gateway,
        global_ipv6_address: endpoint.global_ipv6_address,
        ipv6_gateway: endpoint.ipv6_gateway,
        mac_address: endpoint.mac_address,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{
        ContainerConfig, ContainerState, ContainerStateStatusEnum, NetworkSettings,
        RestartPolicy, RestartPolicyNameEnum,
    };

    fn sample_inspect() -> ContainerInspectResponse {
        let mut networks = HashMap::new();
        networks.insert(
            "backend".to_string(),
            DockerEndpointSettings {
                aliases: Some(vec!["api".to_string()]),
                network_id: Some("net-1".to_string()),
                ip_address: Some("172.18.0.5".to_string()),
                gateway: Some("172.18.0.1".to_string()),
                mac_address: Some("02:42:ac:12:00:05".to_string()),
                ipam_config: Some(EndpointIpamConfig {
                    ipv4_address: Some("172.18.0.5".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );

        let mut exposed = HashMap::new();
        exposed.insert("8080/tcp".to_string(), HashMap::new());

        ContainerInspectResponse {
            id: Some("abc123".to_string()),
            name: Some("/api".to_string()),
            image: Some("sha256:old".to_string()),
            state: Some(ContainerState {
                running: Some(true),
                status: Some(ContainerStateStatusEnum::RUNNING),
                ..Default::default()
            }),
            config: Some(ContainerConfig {
                image: Some("api:latest".to_string()),
                env: Some(vec!["FOO=bar".to_string()]),
                cmd: Some(vec!["--serve".to_string()]),
                entrypoint: Some(vec!["/entrypoint.sh".to_string()]),
                working_dir: Some("/app".to_string()),
                exposed_ports: Some(exposed),
                ..Default::default()
            }),
            host_config: Some(HostConfig {
                memory: Some(512 * 1024 * 1024),
                restart_policy: Some(RestartPolicy {
                    name: Some(RestartPolicyNameEnum::ALWAYS),
                    maximum_retry_count: None,
                }),
                binds: Some(vec!["/srv/data:/data".to_string()]),
                ..Default::default()
            }),
            network_settings: Some(NetworkSettings {
                networks: Some(networks),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_inspect_to_details_normalizes_and_copies() {
        let details = inspect_to_details(sample_inspect()).unwrap();

        assert_eq!(details.id, "abc123");
        assert_eq!(details.name, "api");
        assert_eq!(details.image, "api:latest");
        assert_eq!(details.image_id, "sha256:old");
        assert!(details.running);
        assert_eq!(details.status, "running");
        assert_eq!(details.working_dir.as_deref(), Some("/app"));
        assert_eq!(details.exposed_ports, Some(vec!["8080/tcp".to_string()]));

        let backend = &details.networks["backend"];
        assert_eq!(backend.network_id.as_deref(), Some("net-1"));
        assert_eq!(
            backend.ipam_config.as_ref().and_then(|i| i.ipv4_address.as_deref()),
            Some("172.18.0.5")
        );
    }

    #[test]
    fn test_host_config_survives_round_trip_into_create_config() {
        let details = inspect_to_details(sample_inspect()).unwrap();
        let spec = ContainerSpec {
            name: details.name.clone(),
            image: "api:v2".to_string(),
            host_config: details.host_config.clone(),
            networks: Some(details.networks.clone()),
            exposed_ports: details.exposed_ports.clone(),
            ..Default::default()
        };

        let config = spec_to_config(spec).unwrap();
        let host_config = config.host_config.unwrap();
        assert_eq!(host_config.memory, Some(512 * 1024 * 1024));
        assert_eq!(
            host_config.restart_policy.and_then(|p| p.name),
            Some(RestartPolicyNameEnum::ALWAYS)
        );
        assert_eq!(host_config.binds, Some(vec!["/srv/data:/data".to_string()]));

        let endpoints = config.networking_config.unwrap().endpoints_config;
        assert_eq!(endpoints["backend"].aliases, Some(vec!["api".to_string()]));
        assert_eq!(endpoints["backend"].mac_address.as_deref(), Some("02:42:ac:12:00:05"));
        assert!(config.exposed_ports.unwrap().contains_key("8080/tcp"));
        assert_eq!(config.image.as_deref(), Some("api:v2"));
    }

    #[test]
    fn test_summary_without_names_falls_back_to_short_id() {
        let summary = ContainerSummary {
            id: Some("0123456789abcdef".to_string()),
            image: Some("redis:7".to_string()),
            state: Some("exited".to_string()),
            ..Default::default()
        };

        let container = summary_to_ref(summary);
        assert_eq!(container.name, "0123456789ab");
        assert_eq!(container.state, "exited");
        assert!(container.labels.is_empty());
    }
}
