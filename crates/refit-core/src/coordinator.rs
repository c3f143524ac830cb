use chrono::Utc;
use refit_runtime::{ContainerRef, ContainerRuntime, ImageReference};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::auth::RegistryAuthResolver;
use crate::error::{Result, UpdateError};
use crate::journal::RecoveryJournal;
use crate::notify::Notifier;
use crate::options::UpdaterOptions;
use crate::recreate::ContainerRecreator;
use crate::selection::ContainerSelectionPolicy;
use crate::self_update::SelfUpdateLauncher;
use crate::session::{ContainerUpdateResult, ContainerUpdateState, UpdateSessionResult};

pub const SKIPPED_MESSAGE: &str = "Excluded by selection policy";
pub const SELF_UPDATE_MESSAGE: &str = "Self-update delegated to helper container";

/// Runs one update session over every listed container.
pub struct UpdateCoordinator {
    runtime: Arc<dyn ContainerRuntime>,
    auth: RegistryAuthResolver,
    policy: ContainerSelectionPolicy,
    recreator: ContainerRecreator,
    self_update: SelfUpdateLauncher,
    notifier: Arc<dyn Notifier>,
    options: UpdaterOptions,
}

impl UpdateCoordinator {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        journal: Arc<RecoveryJournal>,
        options: UpdaterOptions,
        auth: RegistryAuthResolver,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            runtime,
            auth,
            policy: ContainerSelectionPolicy::new(options.clone()),
            recreator: ContainerRecreator::new(journal),
            self_update: SelfUpdateLauncher::new(&options),
            notifier,
            options,
        }
    }

    /// List, filter, pull and recreate. Only a failed listing is returned as
    /// an error; per-container failures end up in the session result.
    /// Cancellation stops the pass and returns what was done so far.
    pub async fn run_session(&self, cancel: &CancellationToken) -> Result<UpdateSessionResult> {
        let started_at = Utc::now();
        let containers = self
            .runtime
            .list_containers(self.options.include_stopped)
            .await?;
        debug!("Session listed {} container(s)", containers.len());

        let mut results = Vec::with_capacity(containers.len());
        for container in &containers {
            if cancel.is_cancelled() {
                info!("Session cancelled; {} container(s) not processed", containers.len() - results.len());
                break;
            }

            if !self.policy.should_monitor(container) {
                results.push(
                    ContainerUpdateResult::new(&container.name, &container.image, ContainerUpdateState::Skipped)
                        .with_message(SKIPPED_MESSAGE),
                );
                continue;
            }

            match self.update_container(container, cancel).await {
                Ok(result) => results.push(result),
                Err(UpdateError::Cancelled) => {
                    info!("Session cancelled while updating {}", container.name);
                    break;
                }
                Err(e) => {
                    error!("Failed to update container {}: {}", container.name, e);
                    results.push(
                        ContainerUpdateResult::new(&container.name, &container.image, ContainerUpdateState::Failed)
                            .with_message(e.to_string()),
                    );
                }
            }
        }

        let session = UpdateSessionResult::new(started_at, Utc::now(), results);
        self.notifier.notify_session(&session).await;
        Ok(session)
    }

    async fn update_container(
        &self,
        container: &ContainerRef,
        cancel: &CancellationToken,
    ) -> Result<ContainerUpdateResult> {
        let runtime = self.runtime.as_ref();
        let image = container.image.as_str();

        let before = runtime.inspect_image(image).await?;
        let credentials = self.auth.resolve_for_image(image);
        runtime
            .pull_image(&ImageReference::parse(image), credentials)
            .await?;
        let after = runtime.inspect_image(image).await?;

        if before.id.eq_ignore_ascii_case(&after.id) {
            debug!("{} is up to date ({})", container.name, image);
            return Ok(ContainerUpdateResult::new(&container.name, image, ContainerUpdateState::Fresh));
        }
        info!("New image for {}: {} -> {}", container.name, before.id, after.id);

        if cancel.is_cancelled() {
            return Err(UpdateError::Cancelled);
        }

        if self.options.self_update && self.self_update.is_self(&container.id) {
            self.self_update
                .launch_helper(runtime, container, image)
                .await?;
            return Ok(
                ContainerUpdateResult::new(&container.name, image, ContainerUpdateState::Updated)
                    .with_message(SELF_UPDATE_MESSAGE),
            );
        }

        self.recreator
            .recreate(
                runtime,
                &container.id,
                image,
                self.options.stop_timeout,
                self.options.revive_stopped,
                cancel,
            )
            .await?;

        if self.options.cleanup {
            self.remove_prior_image(&before.id).await;
        }

        Ok(ContainerUpdateResult::new(&container.name, image, ContainerUpdateState::Updated))
    }

    async fn remove_prior_image(&self, image_id: &str) {
        match self.runtime.remove_image(image_id).await {
            Ok(()) => info!("Removed prior image {}", image_id),
            Err(e) => warn!("Image cleanup failed for image {}: {}", image_id, e),
        }
    }
}
