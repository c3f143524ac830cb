use refit_runtime::ContainerRuntime;
use tracing::{error, info, warn};

use crate::journal::RecoveryEntry;

/// Undo a partially applied recreation.
///
/// Steps run in order and each one swallows its own failure:
/// remove the replacement (if one was created), rename the backup back to
/// the original name, restart it if it was running. A failed rename-back is
/// not retried; the original is left under its backup name for an operator.
pub async fn rollback(runtime: &dyn ContainerRuntime, entry: &RecoveryEntry) {
    remove_replacement(runtime, entry).await;
    restore_backup(runtime, entry).await;
}

/// Force-remove the replacement container recorded in `entry`, if any.
pub(crate) async fn remove_replacement(runtime: &dyn ContainerRuntime, entry: &RecoveryEntry) {
    let Some(new_id) = entry.new_container_id.as_deref() else {
        return;
    };
    let name = entry.container_name.as_str();

    match runtime.remove_container(new_id, true).await {
        Ok(()) => info!("Rollback: removed replacement container {} for {}", new_id, name),
        Err(e) if e.is_not_found() => {}
        Err(e) => warn!(
            "Rollback: failed to remove replacement container {} for {}: {}",
            new_id, name, e
        ),
    }
}

/// Rename the parked original back and restart it if it was running.
pub(crate) async fn restore_backup(runtime: &dyn ContainerRuntime, entry: &RecoveryEntry) {
    let name = entry.container_name.as_str();
    let backup_name = entry.backup_name();

    if let Err(e) = runtime
        .rename_container(&entry.backup_container_id, name)
        .await
    {
        error!(
            container = %name,
            backup = %backup_name,
            "Rollback failed: could not rename {} back to {}: {}. Manual intervention required",
            backup_name, name, e
        );
        return;
    }
    info!("Rollback: restored {} from {}", name, backup_name);

    if entry.was_running {
        match runtime.start_container(&entry.backup_container_id).await {
            Ok(true) => info!("Rollback: restarted {}", name),
            Ok(false) => warn!("Rollback: runtime did not start restored container {}", name),
            Err(e) => warn!("Rollback: failed to restart restored container {}: {}", name, e),
        }
    }
}
