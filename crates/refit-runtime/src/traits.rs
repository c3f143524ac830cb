use async_trait::async_trait;
use std::time::Duration;

use crate::{
    ContainerDetails, ContainerRef, ContainerSpec, ImageInfo, ImageReference,
    RegistryCredentials, Result,
};

/// Operations the updater needs from a container runtime endpoint.
///
/// Every call is an independent remote operation; nothing here is
/// transactional. Implementations must report a missing container or image
/// as [`crate::RuntimeError::ContainerNotFound`] /
/// [`crate::RuntimeError::ImageNotFound`] so callers can treat it as
/// "already gone".
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    // Container listing and inspection
    async fn list_containers(&self, include_stopped: bool) -> Result<Vec<ContainerRef>>;

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails>;

    // Container lifecycle operations
    async fn stop_container(&self, id: &str, timeout: Duration) -> Result<()>;

    /// Returns `false` when the runtime reports the container was not started.
    async fn start_container(&self, id: &str) -> Result<bool>;

    async fn rename_container(&self, id: &str, new_name: &str) -> Result<()>;

    async fn remove_container(&self, id: &str, force: bool) -> Result<()>;

    /// Creates the container and returns its id.
    async fn create_container(&self, spec: ContainerSpec) -> Result<String>;

    // Image operations
    async fn inspect_image(&self, reference: &str) -> Result<ImageInfo>;

    async fn pull_image(
        &self,
        image: &ImageReference,
        credentials: Option<RegistryCredentials>,
    ) -> Result<()>;

    async fn remove_image(&self, id: &str) -> Result<()>;

    /// Inspect-based existence check. Errors other than not-found propagate.
    async fn container_exists(&self, id: &str) -> Result<bool> {
        match self.inspect_container(id).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
