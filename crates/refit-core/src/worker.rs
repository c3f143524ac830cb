use refit_runtime::ContainerRuntime;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::auth::RegistryAuthResolver;
use crate::coordinator::UpdateCoordinator;
use crate::error::Result;
use crate::journal::RecoveryJournal;
use crate::notify::Notifier;
use crate::options::UpdaterOptions;
use crate::recovery::RecoveryProcessor;
use crate::schedule::RunScheduler;

/// Top-level loop: recover once, then run sessions on schedule.
pub struct Worker {
    runtime: Arc<dyn ContainerRuntime>,
    recovery: RecoveryProcessor,
    coordinator: UpdateCoordinator,
    scheduler: RunScheduler,
    run_once: bool,
}

impl Worker {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        journal: Arc<RecoveryJournal>,
        coordinator: UpdateCoordinator,
        scheduler: RunScheduler,
        run_once: bool,
    ) -> Self {
        Self {
            runtime,
            recovery: RecoveryProcessor::new(journal),
            coordinator,
            scheduler,
            run_once,
        }
    }

    /// Wire every component from `options`, opening the journal in the data dir.
    pub fn from_options(
        runtime: Arc<dyn ContainerRuntime>,
        options: UpdaterOptions,
        auth: RegistryAuthResolver,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let journal = Arc::new(RecoveryJournal::open(&options.data_dir));
        let scheduler = RunScheduler::from_options(&options)?;
        let run_once = options.run_once;
        let coordinator = UpdateCoordinator::new(
            runtime.clone(),
            journal.clone(),
            options,
            auth,
            notifier,
        );

        Ok(Self::new(runtime, journal, coordinator, scheduler, run_once))
    }

    /// Run until cancelled, or after one session in run-once mode.
    /// Returns the number of sessions started.
    pub async fn run(&self, cancel: &CancellationToken) -> usize {
        self.recovery.recover(self.runtime.as_ref()).await;

        let mut run_number = 0;
        while !cancel.is_cancelled() {
            run_number += 1;
            info!("Starting update session {}", run_number);

            match self.coordinator.run_session(cancel).await {
                Ok(session) => info!(
                    "Finished session {}. Scanned={}, Updated={}, Failed={}",
                    run_number,
                    session.scanned(),
                    session.updated(),
                    session.failed()
                ),
                Err(e) => error!("Session {} failed: {}", run_number, e),
            }

            if self.run_once {
                info!("Run-once mode enabled, exiting worker");
                break;
            }

            if !self.scheduler.wait_for_next_run(cancel).await {
                break;
            }
        }

        info!("Worker stopped after {} session(s)", run_number);
        run_number
    }
}
