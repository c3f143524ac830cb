//! In-memory container runtime.
//!
//! Keeps containers and images in process memory, records every call it
//! receives and lets callers inject failures per operation. It backs the
//! updater's own test suites and is handy for dry runs against a scripted
//! set of containers.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::{
    normalize_container_name, ContainerDetails, ContainerRef, ContainerRuntime, ContainerSpec,
    ImageInfo, ImageReference, RegistryCredentials, Result, RuntimeError,
};

/// Runtime operation kinds, used to target injected failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Inspect,
    Stop,
    Start,
    Rename,
    Remove,
    Create,
    InspectImage,
    Pull,
    RemoveImage,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Inspect => "inspect",
            Operation::Stop => "stop",
            Operation::Start => "start",
            Operation::Rename => "rename",
            Operation::Remove => "remove",
            Operation::Create => "create",
            Operation::InspectImage => "inspect_image",
            Operation::Pull => "pull",
            Operation::RemoveImage => "remove_image",
        }
    }
}

/// A call received by the runtime, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    ListContainers { include_stopped: bool },
    InspectContainer(String),
    StopContainer(String),
    StartContainer(String),
    RenameContainer { id: String, new_name: String },
    RemoveContainer { id: String, force: bool },
    CreateContainer { name: String, image: String },
    InspectImage(String),
    PullImage(String),
    RemoveImage(String),
}

#[derive(Default)]
struct State {
    containers: Vec<ContainerDetails>,
    images: HashMap<String, String>,
    staged_pulls: HashMap<String, String>,
    failures: HashMap<Operation, VecDeque<String>>,
    refused_starts: usize,
    calls: Vec<RuntimeCall>,
    created: Vec<ContainerSpec>,
    next_id: u64,
}

impl State {
    fn take_failure(&mut self, operation: Operation) -> Result<()> {
        match self.failures.get_mut(&operation).and_then(VecDeque::pop_front) {
            Some(message) => Err(RuntimeError::operation_failed(operation.name(), message)),
            None => Ok(()),
        }
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.containers
            .iter()
            .position(|c| c.id == id || c.name == normalize_container_name(id))
            .ok_or_else(|| RuntimeError::ContainerNotFound { id: id.to_string() })
    }

    fn name_taken(&self, name: &str) -> bool {
        self.containers.iter().any(|c| c.name == name)
    }

    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("{:012x}{:052}", self.next_id, 0)
    }
}

#[derive(Default)]
pub struct InMemoryRuntime {
    state: Mutex<State>,
}

impl InMemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a container. An empty id gets one allocated; the id is returned.
    pub fn add_container(&self, mut details: ContainerDetails) -> String {
        let mut state = self.lock();
        if details.id.is_empty() {
            details.id = state.allocate_id();
        }
        details.name = normalize_container_name(&details.name);
        if details.status.is_empty() {
            details.status = if details.running { "running" } else { "exited" }.to_string();
        }
        let id = details.id.clone();
        state.containers.push(details);
        id
    }

    /// Seed a container with just a name, image and running flag.
    pub fn add_simple_container(&self, name: &str, image: &str, running: bool) -> String {
        let image_id = self.lock().images.get(image).cloned().unwrap_or_default();
        self.add_container(ContainerDetails {
            name: name.to_string(),
            image: image.to_string(),
            image_id,
            running,
            ..Default::default()
        })
    }

    pub fn add_image(&self, reference: &str, id: &str) {
        self.lock()
            .images
            .insert(reference.to_string(), id.to_string());
    }

    /// The next pull of `reference` will move it to `new_id`.
    pub fn stage_pull(&self, reference: &str, new_id: &str) {
        self.lock()
            .staged_pulls
            .insert(reference.to_string(), new_id.to_string());
    }

    /// Fail the next call of `operation` with `message`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, operation: Operation, message: &str) {
        self.lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(message.to_string());
    }

    /// The next start call reports "not started" without touching the container.
    pub fn refuse_next_start(&self) {
        self.lock().refused_starts += 1;
    }

    pub fn set_running(&self, id: &str, running: bool) {
        let mut state = self.lock();
        if let Ok(index) = state.position(id) {
            let container = &mut state.containers[index];
            container.running = running;
            container.status = if running { "running" } else { "exited" }.to_string();
        }
    }

    /// Snapshot of a container by id or name.
    pub fn container(&self, id_or_name: &str) -> Option<ContainerDetails> {
        let state = self.lock();
        state
            .position(id_or_name)
            .ok()
            .map(|index| state.containers[index].clone())
    }

    pub fn containers(&self) -> Vec<ContainerDetails> {
        self.lock().containers.clone()
    }

    pub fn image_id(&self, reference: &str) -> Option<String> {
        self.lock().images.get(reference).cloned()
    }

    pub fn has_image_id(&self, id: &str) -> bool {
        self.lock().images.values().any(|v| v == id)
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Specs passed to `create_container`, in order.
    pub fn created_specs(&self) -> Vec<ContainerSpec> {
        self.lock().created.clone()
    }
}

#[async_trait]
impl ContainerRuntime for InMemoryRuntime {
    async fn list_containers(&self, include_stopped: bool) -> Result<Vec<ContainerRef>> {
        let mut state = self.lock();
        state.calls.push(RuntimeCall::ListContainers { include_stopped });
        state.take_failure(Operation::List)?;

        Ok(state
            .containers
            .iter()
            .filter(|c| include_stopped || c.running)
            .map(|c| ContainerRef {
                id: c.id.clone(),
                name: c.name.clone(),
                image: c.image.clone(),
                image_id: c.image_id.clone(),
                labels: c.labels.clone().unwrap_or_default(),
                state: c.status.clone(),
            })
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails> {
        let mut state = self.lock();
        state.calls.push(RuntimeCall::InspectContainer(id.to_string()));
        state.take_failure(Operation::Inspect)?;

        let index = state.position(id)?;
        Ok(state.containers[index].clone())
    }

    async fn stop_container(&self, id: &str, _timeout: Duration) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(RuntimeCall::StopContainer(id.to_string()));
        state.take_failure(Operation::Stop)?;

        let index = state.position(id)?;
        let container = &mut state.containers[index];
        container.running = false;
        container.status = "exited".to_string();
        Ok(())
    }

    async fn start_container(&self, id: &str) -> Result<bool> {
        let mut state = self.lock();
        state.calls.push(RuntimeCall::StartContainer(id.to_string()));
        state.take_failure(Operation::Start)?;

        let index = state.position(id)?;
        if state.refused_starts > 0 {
            state.refused_starts -= 1;
            return Ok(false);
        }

        let container = &mut state.containers[index];
        container.running = true;
        container.status = "running".to_string();
        Ok(true)
    }

    async fn rename_container(&self, id: &str, new_name: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(RuntimeCall::RenameContainer {
            id: id.to_string(),
            new_name: new_name.to_string(),
        });
        state.take_failure(Operation::Rename)?;

        let index = state.position(id)?;
        let new_name = normalize_container_name(new_name);
        if state.name_taken(&new_name) {
            return Err(RuntimeError::operation_failed(
                "rename",
                format!("Conflict. The container name \"/{}\" is already in use", new_name),
            ));
        }
        state.containers[index].name = new_name;
        Ok(())
    }

    async fn remove_container(&self, id: &str, force: bool) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(RuntimeCall::RemoveContainer {
            id: id.to_string(),
            force,
        });
        state.take_failure(Operation::Remove)?;

        let index = state.position(id)?;
        if state.containers[index].running && !force {
            return Err(RuntimeError::operation_failed(
                "remove",
                "You cannot remove a running container. Stop the container before attempting removal or force remove",
            ));
        }
        state.containers.remove(index);
        Ok(())
    }

    async fn create_container(&self, spec: ContainerSpec) -> Result<String> {
        let mut state = self.lock();
        state.calls.push(RuntimeCall::CreateContainer {
            name: spec.name.clone(),
            image: spec.image.clone(),
        });
        state.take_failure(Operation::Create)?;

        let name = normalize_container_name(&spec.name);
        if state.name_taken(&name) {
            return Err(RuntimeError::operation_failed(
                "create",
                format!("Conflict. The container name \"/{}\" is already in use", name),
            ));
        }

        let id = state.allocate_id();
        let details = ContainerDetails {
            id: id.clone(),
            name,
            image: spec.image.clone(),
            image_id: state.images.get(&spec.image).cloned().unwrap_or_default(),
            running: false,
            status: "created".to_string(),
            env: spec.env.clone(),
            cmd: spec.cmd.clone(),
            entrypoint: spec.entrypoint.clone(),
            working_dir: spec.working_dir.clone(),
            labels: spec.labels.clone(),
            exposed_ports: spec.exposed_ports.clone(),
            host_config: spec.host_config.clone(),
            networks: spec.networks.clone().unwrap_or_default(),
        };
        state.containers.push(details);
        state.created.push(spec);
        Ok(id)
    }

    async fn inspect_image(&self, reference: &str) -> Result<ImageInfo> {
        let mut state = self.lock();
        state.calls.push(RuntimeCall::InspectImage(reference.to_string()));
        state.take_failure(Operation::InspectImage)?;

        state
            .images
            .get(reference)
            .map(|id| ImageInfo {
                id: id.clone(),
                reference: reference.to_string(),
            })
            .ok_or_else(|| RuntimeError::ImageNotFound {
                name: reference.to_string(),
            })
    }

    async fn pull_image(
        &self,
        image: &ImageReference,
        _credentials: Option<RegistryCredentials>,
    ) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(RuntimeCall::PullImage(image.full_name()));
        state.take_failure(Operation::Pull)?;

        let staged: Vec<String> = state
            .staged_pulls
            .keys()
            .filter(|reference| ImageReference::parse(reference) == *image)
            .cloned()
            .collect();
        for reference in staged {
            if let Some(new_id) = state.staged_pulls.remove(&reference) {
                state.images.insert(reference, new_id);
            }
        }
        Ok(())
    }

    async fn remove_image(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(RuntimeCall::RemoveImage(id.to_string()));
        state.take_failure(Operation::RemoveImage)?;

        let before = state.images.len();
        state.images.retain(|reference, image_id| image_id != id && reference != id);
        if state.images.len() == before {
            return Err(RuntimeError::ImageNotFound {
                name: id.to_string(),
            });
        }
        Ok(())
    }
}
