//! Container recreation with a rename checkpoint.
//!
//! The original container is never deleted before its replacement is up.
//! It is parked under `<name>__pre_update`, the journal records that fact,
//! and only once the replacement is created (and started, when required)
//! is the parked container removed.

use refit_runtime::{normalize_container_name, ContainerDetails, ContainerRuntime, ContainerSpec};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, UpdateError};
use crate::journal::{RecoveryEntry, RecoveryJournal};
use crate::rollback::rollback;

/// Suffix reserved for parked original containers
pub const BACKUP_SUFFIX: &str = "__pre_update";

pub fn backup_name(container_name: &str) -> String {
    format!("{}{}", container_name, BACKUP_SUFFIX)
}

/// Creation parameters reproducing `details` on a different image.
pub fn build_create_spec(details: &ContainerDetails, image_name: &str) -> ContainerSpec {
    ContainerSpec {
        name: normalize_container_name(&details.name),
        image: image_name.to_string(),
        env: details.env.clone(),
        cmd: details.cmd.clone(),
        entrypoint: details.entrypoint.clone(),
        working_dir: details.working_dir.clone(),
        labels: details.labels.clone(),
        exposed_ports: details.exposed_ports.clone(),
        host_config: details.host_config.clone(),
        networks: if details.networks.is_empty() {
            None
        } else {
            Some(details.networks.clone())
        },
    }
}

/// Best-effort start of an original that was stopped before the rename
/// checkpoint. Nothing is journaled yet, so this is the only way back.
async fn restart_original(runtime: &dyn ContainerRuntime, id: &str, name: &str, reason: &str) {
    match runtime.start_container(id).await {
        Ok(true) => info!("Restarted {} after {}", name, reason),
        Ok(false) => warn!("Container {} was not restarted after {}", name, reason),
        Err(e) => warn!("Failed to restart {} after {}: {}", name, reason, e),
    }
}

pub struct ContainerRecreator {
    journal: Arc<RecoveryJournal>,
}

impl ContainerRecreator {
    pub fn new(journal: Arc<RecoveryJournal>) -> Self {
        Self { journal }
    }

    pub fn journal(&self) -> &RecoveryJournal {
        &self.journal
    }

    /// Replace `container_id` with a container running `image_name`.
    ///
    /// Before the rename checkpoint, a failure or cancellation restarts the
    /// original if it was running and journals nothing.
    ///
    /// On failure after the checkpoint the original is restored and the
    /// journal entry cleared before the error is returned. Cancellation after
    /// the checkpoint returns [`UpdateError::Cancelled`] and leaves the entry
    /// for the recovery pass.
    pub async fn recreate(
        &self,
        runtime: &dyn ContainerRuntime,
        container_id: &str,
        image_name: &str,
        stop_timeout: Duration,
        revive_stopped: bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(UpdateError::Cancelled);
        }

        let details = runtime.inspect_container(container_id).await?;
        let name = normalize_container_name(&details.name);
        let was_running = details.running;

        if was_running {
            debug!("Stopping {} (timeout {:?})", name, stop_timeout);
            if let Err(e) = runtime.stop_container(container_id, stop_timeout).await {
                restart_original(runtime, container_id, &name, "stop failure").await;
                return Err(e.into());
            }
        }

        if cancel.is_cancelled() {
            if was_running {
                restart_original(runtime, container_id, &name, "cancellation").await;
            }
            return Err(UpdateError::Cancelled);
        }

        let backup = backup_name(&name);
        if let Err(e) = runtime.rename_container(container_id, &backup).await {
            if was_running {
                restart_original(runtime, container_id, &name, "rename failure").await;
            }
            return Err(e.into());
        }

        let mut entry = RecoveryEntry::renamed(
            name.clone(),
            image_name,
            container_id,
            was_running,
            revive_stopped,
        );
        self.journal.begin_recreation(entry.clone());

        if cancel.is_cancelled() {
            info!("Update of {} cancelled; recovery will resolve {}", name, backup);
            return Err(UpdateError::Cancelled);
        }

        match self
            .provision(runtime, &details, &mut entry, cancel)
            .await
        {
            Ok(()) => {}
            Err(UpdateError::Cancelled) => {
                info!("Update of {} cancelled; recovery will resolve {}", name, backup);
                return Err(UpdateError::Cancelled);
            }
            Err(e) => {
                warn!("Recreation of {} failed, rolling back: {}", name, e);
                rollback(runtime, &entry).await;
                self.journal.complete(&name);
                return Err(e);
            }
        }

        if let Err(e) = runtime.remove_container(container_id, true).await {
            warn!("Failed to remove backup container {}: {}", backup, e);
        }
        self.journal.complete(&name);

        info!("Recreated container {} using image {}", name, image_name);
        Ok(())
    }

    async fn provision(
        &self,
        runtime: &dyn ContainerRuntime,
        details: &ContainerDetails,
        entry: &mut RecoveryEntry,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let spec = build_create_spec(details, &entry.image_name);
        let new_id = runtime.create_container(spec).await?;
        entry.new_container_id = Some(new_id.clone());
        self.journal.record_created(&entry.container_name, &new_id);

        if !entry.should_start() {
            return Ok(());
        }

        if cancel.is_cancelled() {
            return Err(UpdateError::Cancelled);
        }

        if !runtime.start_container(&new_id).await? {
            return Err(UpdateError::StartRefused {
                name: entry.container_name.clone(),
            });
        }
        self.journal.record_started(&entry.container_name);
        Ok(())
    }
}
