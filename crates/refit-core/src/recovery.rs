//! Resolution of recreations interrupted by a crash.
//!
//! Runs once before the first session. Every decision is made from live
//! runtime state, so running it again over the same journal converges.

use refit_runtime::ContainerRuntime;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::journal::{RecoveryEntry, RecoveryJournal};
use crate::rollback::{remove_replacement, restore_backup};

/// What the runtime currently holds for one journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LiveState {
    backup_exists: bool,
    new_exists: bool,
    new_running: bool,
}

pub struct RecoveryProcessor {
    journal: Arc<RecoveryJournal>,
}

impl RecoveryProcessor {
    pub fn new(journal: Arc<RecoveryJournal>) -> Self {
        Self { journal }
    }

    /// Resolve every pending entry. Never fails; an entry that cannot be
    /// resolved is logged and cleared.
    pub async fn recover(&self, runtime: &dyn ContainerRuntime) {
        let entries = self.journal.pending_entries();
        if entries.is_empty() {
            return;
        }

        warn!(
            "Found {} interrupted recreation(s) from a previous session. Attempting recovery",
            entries.len()
        );

        for entry in &entries {
            if let Err(e) = self.recover_entry(runtime, entry).await {
                error!(
                    container = %entry.container_name,
                    backup = %entry.backup_name(),
                    "Recovery failed for {}: {}. Manual intervention may be needed; the backup container may still exist as '{}'",
                    entry.container_name,
                    e,
                    entry.backup_name()
                );
                self.journal.complete(&entry.container_name);
            }
        }
    }

    async fn recover_entry(&self, runtime: &dyn ContainerRuntime, entry: &RecoveryEntry) -> Result<()> {
        info!(
            "Recovering {} (phase={:?}, backup={}, new={})",
            entry.container_name,
            entry.phase,
            short_id(&entry.backup_container_id),
            entry.new_container_id.as_deref().map(short_id).unwrap_or("none")
        );

        let live = Self::inspect_live_state(runtime, entry).await?;

        if !live.backup_exists && !live.new_exists {
            warn!(
                "Recovery: neither backup nor replacement found for {}. Clearing journal entry",
                entry.container_name
            );
            self.journal.complete(&entry.container_name);
            return Ok(());
        }

        if live.new_running {
            info!(
                "Recovery: replacement for {} is already running. Cleaning up backup",
                entry.container_name
            );
            return self.cleanup_backup(runtime, entry).await;
        }

        if live.new_exists {
            if !entry.should_start() {
                info!(
                    "Recovery: replacement for {} exists and was not running before. Cleaning up",
                    entry.container_name
                );
                return self.cleanup_backup(runtime, entry).await;
            }

            if self.try_start_replacement(runtime, entry).await {
                return self.cleanup_backup(runtime, entry).await;
            }
            warn!(
                "Recovery: could not start replacement for {}. Rolling back",
                entry.container_name
            );
        }

        if live.new_exists {
            remove_replacement(runtime, entry).await;
        }
        if live.backup_exists {
            restore_backup(runtime, entry).await;
        }
        self.journal.complete(&entry.container_name);
        info!("Recovery: rolled back {} to its previous state", entry.container_name);
        Ok(())
    }

    async fn inspect_live_state(
        runtime: &dyn ContainerRuntime,
        entry: &RecoveryEntry,
    ) -> Result<LiveState> {
        let backup_exists = runtime.container_exists(&entry.backup_container_id).await?;

        let (new_exists, new_running) = match entry.new_container_id.as_deref() {
            None => (false, false),
            Some(new_id) => match runtime.inspect_container(new_id).await {
                Ok(details) => (true, details.running),
                Err(e) if e.is_not_found() => (false, false),
                Err(e) => return Err(e.into()),
            },
        };

        Ok(LiveState {
            backup_exists,
            new_exists,
            new_running,
        })
    }

    async fn try_start_replacement(&self, runtime: &dyn ContainerRuntime, entry: &RecoveryEntry) -> bool {
        let Some(new_id) = entry.new_container_id.as_deref() else {
            return false;
        };

        match runtime.start_container(new_id).await {
            Ok(true) => {
                self.journal.record_started(&entry.container_name);
                info!("Recovery: started replacement container for {}", entry.container_name);
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(
                    "Recovery: failed to start replacement for {}: {}",
                    entry.container_name, e
                );
                false
            }
        }
    }

    async fn cleanup_backup(&self, runtime: &dyn ContainerRuntime, entry: &RecoveryEntry) -> Result<()> {
        if runtime.container_exists(&entry.backup_container_id).await? {
            match runtime.remove_container(&entry.backup_container_id, true).await {
                Ok(()) => info!("Recovery: removed backup container for {}", entry.container_name),
                Err(e) => warn!(
                    "Recovery: could not remove backup for {}: {}. It is safe to remove '{}' manually",
                    entry.container_name,
                    e,
                    entry.backup_name()
                ),
            }
        }

        self.journal.complete(&entry.container_name);
        info!("Recovery: completed for {}", entry.container_name);
        Ok(())
    }
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}
