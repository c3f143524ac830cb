use refit_core::{ContainerRecreator, RecoveryJournal, RecoveryPhase, UpdateError};
use refit_runtime::{ContainerRuntime, InMemoryRuntime, Operation, RuntimeCall};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const STOP_TIMEOUT: Duration = Duration::from_secs(10);

struct Fixture {
    _dir: TempDir,
    journal: Arc<RecoveryJournal>,
    recreator: ContainerRecreator,
    runtime: InMemoryRuntime,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let journal = Arc::new(RecoveryJournal::open(dir.path()));
    Fixture {
        recreator: ContainerRecreator::new(journal.clone()),
        journal,
        runtime: InMemoryRuntime::new(),
        _dir: dir,
    }
}

#[tokio::test]
async fn test_successful_recreation_of_running_container() {
    let f = fixture();
    f.runtime.add_image("api:latest", "sha256:v2");
    let old_id = f.runtime.add_simple_container("api", "api:latest", true);

    f.recreator
        .recreate(&f.runtime, &old_id, "api:latest", STOP_TIMEOUT, false, &CancellationToken::new())
        .await
        .unwrap();

    let replacement = f.runtime.container("api").unwrap();
    assert_ne!(replacement.id, old_id);
    assert!(replacement.running);
    assert!(f.runtime.container(&old_id).is_none());
    assert!(f.runtime.container("api__pre_update").is_none());
    assert!(f.journal.is_empty());

    assert_eq!(
        f.runtime.calls(),
        vec![
            RuntimeCall::InspectContainer(old_id.clone()),
            RuntimeCall::StopContainer(old_id.clone()),
            RuntimeCall::RenameContainer {
                id: old_id.clone(),
                new_name: "api__pre_update".into()
            },
            RuntimeCall::CreateContainer {
                name: "api".into(),
                image: "api:latest".into()
            },
            RuntimeCall::StartContainer(replacement.id.clone()),
            RuntimeCall::RemoveContainer {
                id: old_id,
                force: true
            },
        ]
    );
}

#[tokio::test]
async fn test_stopped_container_is_recreated_without_start() {
    let f = fixture();
    let old_id = f.runtime.add_simple_container("batch", "batch:2", false);

    f.recreator
        .recreate(&f.runtime, &old_id, "batch:2", STOP_TIMEOUT, false, &CancellationToken::new())
        .await
        .unwrap();

    let calls = f.runtime.calls();
    assert!(!calls.iter().any(|c| matches!(c, RuntimeCall::StopContainer(_))));
    assert!(!calls.iter().any(|c| matches!(c, RuntimeCall::StartContainer(_))));
    let replacement = f.runtime.container("batch").unwrap();
    assert!(!replacement.running);
    assert_eq!(replacement.status, "created");
    assert!(f.journal.is_empty());
}

#[tokio::test]
async fn test_revive_stopped_starts_replacement() {
    let f = fixture();
    let old_id = f.runtime.add_simple_container("batch", "batch:2", false);

    f.recreator
        .recreate(&f.runtime, &old_id, "batch:2", STOP_TIMEOUT, true, &CancellationToken::new())
        .await
        .unwrap();

    assert!(f.runtime.container("batch").unwrap().running);
    assert!(f.journal.is_empty());
}

#[tokio::test]
async fn test_refused_start_rolls_back_and_restarts_original() {
    let f = fixture();
    let old_id = f.runtime.add_simple_container("api", "api:latest", true);
    f.runtime.refuse_next_start();

    let err = f
        .recreator
        .recreate(&f.runtime, &old_id, "api:latest", STOP_TIMEOUT, false, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, UpdateError::StartRefused { ref name } if name == "api"));
    assert_eq!(err.to_string(), "Failed to start recreated container 'api'");

    let restored = f.runtime.container("api").unwrap();
    assert_eq!(restored.id, old_id);
    assert!(restored.running);
    assert_eq!(f.runtime.containers().len(), 1);
    assert!(f.journal.is_empty());

    let calls = f.runtime.calls();
    let tail = &calls[calls.len() - 3..];
    assert!(matches!(&tail[0], RuntimeCall::RemoveContainer { force: true, .. }));
    assert_eq!(
        tail[1],
        RuntimeCall::RenameContainer {
            id: old_id.clone(),
            new_name: "api".into()
        }
    );
    assert_eq!(tail[2], RuntimeCall::StartContainer(old_id));
}

#[tokio::test]
async fn test_create_failure_rolls_back_without_removal() {
    let f = fixture();
    let old_id = f.runtime.add_simple_container("api", "api:latest", true);
    f.runtime.fail_next(Operation::Create, "no such image");

    let err = f
        .recreator
        .recreate(&f.runtime, &old_id, "api:latest", STOP_TIMEOUT, false, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("no such image"));
    assert!(!f
        .runtime
        .calls()
        .iter()
        .any(|c| matches!(c, RuntimeCall::RemoveContainer { .. })));
    let restored = f.runtime.container("api").unwrap();
    assert_eq!(restored.id, old_id);
    assert!(restored.running);
    assert!(f.journal.is_empty());
}

#[tokio::test]
async fn test_start_error_rolls_back_stopped_original_without_restart() {
    let f = fixture();
    let old_id = f.runtime.add_simple_container("batch", "batch:2", false);
    f.runtime.fail_next(Operation::Start, "port already allocated");

    let err = f
        .recreator
        .recreate(&f.runtime, &old_id, "batch:2", STOP_TIMEOUT, true, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("port already allocated"));
    let restored = f.runtime.container("batch").unwrap();
    assert_eq!(restored.id, old_id);
    assert!(!restored.running);
    let starts = f
        .runtime
        .calls()
        .into_iter()
        .filter(|c| matches!(c, RuntimeCall::StartContainer(_)))
        .count();
    assert_eq!(starts, 1);
    assert!(f.journal.is_empty());
}

#[tokio::test]
async fn test_stop_failure_restarts_original_and_skips_journal() {
    let f = fixture();
    let old_id = f.runtime.add_simple_container("api", "api:latest", true);
    f.runtime.fail_next(Operation::Stop, "timeout");

    assert!(f
        .recreator
        .recreate(&f.runtime, &old_id, "api:latest", STOP_TIMEOUT, false, &CancellationToken::new())
        .await
        .is_err());

    assert_eq!(
        f.runtime.calls(),
        vec![
            RuntimeCall::InspectContainer(old_id.clone()),
            RuntimeCall::StopContainer(old_id.clone()),
            RuntimeCall::StartContainer(old_id.clone()),
        ]
    );
    let original = f.runtime.container("api").unwrap();
    assert_eq!(original.id, old_id);
    assert!(original.running);
    assert!(f.journal.is_empty());
}

#[tokio::test]
async fn test_rename_failure_restarts_original_and_skips_journal() {
    let f = fixture();
    let old_id = f.runtime.add_simple_container("api", "api:latest", true);
    f.runtime.fail_next(Operation::Rename, "conflict");

    assert!(f
        .recreator
        .recreate(&f.runtime, &old_id, "api:latest", STOP_TIMEOUT, false, &CancellationToken::new())
        .await
        .is_err());

    let original = f.runtime.container("api").unwrap();
    assert_eq!(original.id, old_id);
    assert!(original.running);
    assert!(f.journal.is_empty());
}

#[tokio::test]
async fn test_cancelled_before_start_touches_nothing() {
    let f = fixture();
    let old_id = f.runtime.add_simple_container("api", "api:latest", true);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = f
        .recreator
        .recreate(&f.runtime, &old_id, "api:latest", STOP_TIMEOUT, false, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, UpdateError::Cancelled));
    assert!(f.runtime.calls().is_empty());
    assert!(f.runtime.container("api").unwrap().running);
}

/// Cancels the token once the wrapped runtime completes `trigger`.
struct CancelAfter {
    inner: InMemoryRuntime,
    cancel: CancellationToken,
    trigger: Operation,
}

impl CancelAfter {
    fn new(trigger: Operation, cancel: &CancellationToken) -> Self {
        Self {
            inner: InMemoryRuntime::new(),
            cancel: cancel.clone(),
            trigger,
        }
    }

    fn fire(&self, operation: Operation) {
        if operation == self.trigger {
            self.cancel.cancel();
        }
    }
}

#[async_trait::async_trait]
impl ContainerRuntime for CancelAfter {
    async fn list_containers(&self, include_stopped: bool) -> refit_runtime::Result<Vec<refit_runtime::ContainerRef>> {
        self.inner.list_containers(include_stopped).await
    }
    async fn inspect_container(&self, id: &str) -> refit_runtime::Result<refit_runtime::ContainerDetails> {
        self.inner.inspect_container(id).await
    }
    async fn stop_container(&self, id: &str, timeout: Duration) -> refit_runtime::Result<()> {
        self.inner.stop_container(id, timeout).await?;
        self.fire(Operation::Stop);
        Ok(())
    }
    async fn start_container(&self, id: &str) -> refit_runtime::Result<bool> {
        self.inner.start_container(id).await
    }
    async fn rename_container(&self, id: &str, new_name: &str) -> refit_runtime::Result<()> {
        self.inner.rename_container(id, new_name).await
    }
    async fn remove_container(&self, id: &str, force: bool) -> refit_runtime::Result<()> {
        self.inner.remove_container(id, force).await
    }
    async fn create_container(&self, spec: refit_runtime::ContainerSpec) -> refit_runtime::Result<String> {
        let id = self.inner.create_container(spec).await?;
        self.fire(Operation::Create);
        Ok(id)
    }
    async fn inspect_image(&self, reference: &str) -> refit_runtime::Result<refit_runtime::ImageInfo> {
        self.inner.inspect_image(reference).await
    }
    async fn pull_image(
        &self,
        image: &refit_runtime::ImageReference,
        credentials: Option<refit_runtime::RegistryCredentials>,
    ) -> refit_runtime::Result<()> {
        self.inner.pull_image(image, credentials).await
    }
    async fn remove_image(&self, id: &str) -> refit_runtime::Result<()> {
        self.inner.remove_image(id).await
    }
}

#[tokio::test]
async fn test_cancel_after_checkpoint_leaves_entry_for_recovery() {
    let f = fixture();
    let cancel = CancellationToken::new();
    let runtime = CancelAfter::new(Operation::Create, &cancel);
    let old_id = runtime.inner.add_simple_container("api", "api:latest", true);

    let err = f
        .recreator
        .recreate(&runtime, &old_id, "api:latest", STOP_TIMEOUT, false, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, UpdateError::Cancelled));

    let pending = f.journal.pending_entries();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].container_name, "api");
    assert_eq!(pending[0].backup_container_id, old_id);
    assert_eq!(pending[0].phase, RecoveryPhase::Created);
    assert!(pending[0].was_running);

    // Both containers are still there for recovery to sort out.
    assert!(runtime.inner.container("api__pre_update").is_some());
    assert!(runtime.inner.container("api").is_some());
}

#[tokio::test]
async fn test_recreation_supersedes_stale_entry_for_same_name() {
    let f = fixture();
    f.journal.begin_recreation(refit_core::RecoveryEntry::renamed(
        "api",
        "api:old",
        "stale-backup",
        false,
        false,
    ));
    let old_id = f.runtime.add_simple_container("api", "api:latest", true);

    f.recreator
        .recreate(&f.runtime, &old_id, "api:latest", STOP_TIMEOUT, false, &CancellationToken::new())
        .await
        .unwrap();

    assert!(f.journal.is_empty());
}

#[tokio::test]
async fn test_cancel_after_stop_restarts_original() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Arc::new(RecoveryJournal::open(dir.path()));
    let recreator = ContainerRecreator::new(journal.clone());
    let cancel = CancellationToken::new();
    let runtime = CancelAfter::new(Operation::Stop, &cancel);
    let old_id = runtime.inner.add_simple_container("api", "api:latest", true);

    let err = recreator
        .recreate(&runtime, &old_id, "api:latest", STOP_TIMEOUT, false, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, UpdateError::Cancelled));

    assert_eq!(
        runtime.inner.calls(),
        vec![
            RuntimeCall::InspectContainer(old_id.clone()),
            RuntimeCall::StopContainer(old_id.clone()),
            RuntimeCall::StartContainer(old_id.clone()),
        ]
    );
    let original = runtime.inner.container("api").unwrap();
    assert_eq!(original.id, old_id);
    assert!(original.running);
    assert!(journal.is_empty());

    // A restarted process finds nothing to recover and the service is up.
    let reopened = Arc::new(RecoveryJournal::open(dir.path()));
    refit_core::RecoveryProcessor::new(reopened.clone())
        .recover(&runtime)
        .await;
    assert!(reopened.is_empty());
    assert!(runtime.inner.container("api").unwrap().running);
}
