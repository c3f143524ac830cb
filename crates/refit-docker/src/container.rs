use async_trait::async_trait;
use bollard::auth::DockerCredentials;
use bollard::container::{
    CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
    RemoveContainerOptions, RenameContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::image::{CreateImageOptions, RemoveImageOptions};
use bollard::Docker;
use futures_util::stream::StreamExt;
use refit_runtime::{
    ContainerDetails, ContainerRef, ContainerRuntime, ContainerSpec, ImageInfo, ImageReference,
    RegistryCredentials, Result, RuntimeConfig, RuntimeError,
};
use std::time::Duration;
use tracing::debug;

use crate::connection::connect;
use crate::convert::{inspect_to_details, spec_to_config, summary_to_ref};
use crate::error::{container_error, image_error, is_not_modified};

/// [`ContainerRuntime`] backed by the Docker Engine API
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    pub fn connect(config: &RuntimeConfig) -> Result<Self> {
        Ok(Self::new(connect(config)?))
    }

    pub fn docker(&self) -> &Docker {
        &self.docker
    }

    pub async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| RuntimeError::ConnectionError {
                message: e.to_string(),
            })
    }
}

fn to_docker_credentials(credentials: RegistryCredentials) -> DockerCredentials {
    DockerCredentials {
        username: credentials.username,
        password: credentials.password,
        identitytoken: credentials.identity_token,
        serveraddress: Some(credentials.server_address),
        ..Default::default()
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_containers(&self, include_stopped: bool) -> Result<Vec<ContainerRef>> {
        let options = ListContainersOptions::<String> {
            all: include_stopped,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| RuntimeError::operation_failed("list", e.to_string()))?;

        Ok(containers.into_iter().map(summary_to_ref).collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails> {
        let inspect = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| container_error("inspect", id, e))?;
        inspect_to_details(inspect)
    }

    async fn stop_container(&self, id: &str, timeout: Duration) -> Result<()> {
        let options = StopContainerOptions {
            t: timeout.as_secs_f64().ceil() as i64,
        };

        match self.docker.stop_container(id, Some(options)).await {
            Ok(()) => Ok(()),
            // Already stopped
            Err(e) if is_not_modified(&e) => Ok(()),
            Err(e) => Err(container_error("stop", id, e)),
        }
    }

    async fn start_container(&self, id: &str) -> Result<bool> {
        match self
            .docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
        {
            Ok(()) => Ok(true),
            Err(e) if is_not_modified(&e) => Ok(false),
            Err(e) => Err(container_error("start", id, e)),
        }
    }

    async fn rename_container(&self, id: &str, new_name: &str) -> Result<()> {
        let options = RenameContainerOptions { name: new_name };
        self.docker
            .rename_container(id, options)
            .await
            .map_err(|e| container_error("rename", id, e))
    }

    async fn remove_container(&self, id: &str, force: bool) -> Result<()> {
        let options = RemoveContainerOptions {
            force,
            v: false,
            ..Default::default()
        };
        self.docker
            .remove_container(id, Some(options))
            .await
            .map_err(|e| container_error("remove", id, e))
    }

    async fn create_container(&self, spec: ContainerSpec) -> Result<String> {
        let name = spec.name.clone();
        let options = CreateContainerOptions {
            name: name.clone(),
            platform: None,
        };
        let config = spec_to_config(spec)?;

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| RuntimeError::operation_failed("create", e.to_string()))?;

        for warning in &response.warnings {
            debug!("Create warning for {}: {}", name, warning);
        }
        Ok(response.id)
    }

    async fn inspect_image(&self, reference: &str) -> Result<ImageInfo> {
        let image = self
            .docker
            .inspect_image(reference)
            .await
            .map_err(|e| image_error("inspect_image", reference, e))?;

        Ok(ImageInfo {
            id: image.id.unwrap_or_default(),
            reference: reference.to_string(),
        })
    }

    async fn pull_image(
        &self,
        image: &ImageReference,
        credentials: Option<RegistryCredentials>,
    ) -> Result<()> {
        let options = CreateImageOptions {
            from_image: image.repository.clone(),
            tag: image.tag.clone(),
            ..Default::default()
        };

        let mut stream = self.docker.create_image(
            Some(options),
            None,
            credentials.map(to_docker_credentials),
        );

        while let Some(progress) = stream.next().await {
            let info = progress.map_err(|e| image_error("pull", &image.full_name(), e))?;
            if let Some(status) = info.status {
                debug!("Pull {}: {}", image, status);
            }
        }
        Ok(())
    }

    async fn remove_image(&self, id: &str) -> Result<()> {
        let options = RemoveImageOptions {
            force: false,
            noprune: false,
        };
        self.docker
            .remove_image(id, Some(options), None)
            .await
            .map(|_| ())
            .map_err(|e| image_error("remove_image", id, e))
    }
}
