//! End-to-end runs through the worker against an in-memory runtime.

use async_trait::async_trait;
use refit_core::{
    ContainerUpdateState, Notifier, RecoveryEntry, RecoveryJournal, RegistryAuthResolver,
    UpdateSessionResult, UpdaterOptions, Worker,
};
use refit_runtime::{ContainerRuntime, InMemoryRuntime, RuntimeCall};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct RecordingNotifier {
    sessions: Mutex<Vec<UpdateSessionResult>>,
    cancel_after: Option<CancellationToken>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_session(&self, session: &UpdateSessionResult) {
        self.sessions.lock().unwrap().push(session.clone());
        if let Some(cancel) = &self.cancel_after {
            cancel.cancel();
        }
    }
}

fn options(dir: &TempDir) -> UpdaterOptions {
    UpdaterOptions {
        data_dir: dir.path().to_path_buf(),
        run_once: true,
        ..Default::default()
    }
}

fn worker(
    runtime: &Arc<InMemoryRuntime>,
    options: UpdaterOptions,
    notifier: &Arc<RecordingNotifier>,
) -> Worker {
    Worker::from_options(
        runtime.clone() as Arc<dyn ContainerRuntime>,
        options,
        RegistryAuthResolver::disabled(),
        notifier.clone() as Arc<dyn Notifier>,
    )
    .unwrap()
}

fn running_api(runtime: &InMemoryRuntime) -> String {
    runtime.add_image("api:latest", "sha256:api-1");
    runtime.add_simple_container("api", "api:latest", true)
}

#[tokio::test]
async fn test_scenario_successful_update() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Arc::new(InMemoryRuntime::new());
    let old_id = running_api(&runtime);
    runtime.stage_pull("api:latest", "sha256:api-2");
    let notifier = Arc::new(RecordingNotifier::default());

    let sessions = worker(&runtime, options(&dir), &notifier)
        .run(&CancellationToken::new())
        .await;

    assert_eq!(sessions, 1);
    let api = runtime.container("api").unwrap();
    assert_ne!(api.id, old_id);
    assert!(api.running);
    assert!(runtime.container(&old_id).is_none());
    assert!(runtime.container("api__pre_update").is_none());
    assert!(RecoveryJournal::open(dir.path()).is_empty());

    let recorded = notifier.sessions.lock().unwrap().clone();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].results[0].state, ContainerUpdateState::Updated);
}

#[tokio::test]
async fn test_scenario_start_failure_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Arc::new(InMemoryRuntime::new());
    let old_id = running_api(&runtime);
    runtime.stage_pull("api:latest", "sha256:api-2");
    runtime.refuse_next_start();
    let notifier = Arc::new(RecordingNotifier::default());

    worker(&runtime, options(&dir), &notifier)
        .run(&CancellationToken::new())
        .await;

    let api = runtime.container("api").unwrap();
    assert_eq!(api.id, old_id);
    assert!(api.running);
    assert_eq!(runtime.containers().len(), 1);

    let calls = runtime.calls();
    let rename_back = calls
        .iter()
        .position(|c| {
            *c == RuntimeCall::RenameContainer {
                id: old_id.clone(),
                new_name: "api".into(),
            }
        })
        .unwrap();
    assert_eq!(calls[rename_back + 1], RuntimeCall::StartContainer(old_id.clone()));
    assert!(RecoveryJournal::open(dir.path()).is_empty());

    let recorded = notifier.sessions.lock().unwrap().clone();
    let result = recorded[0].result_for("api").unwrap();
    assert_eq!(result.state, ContainerUpdateState::Failed);
    assert_eq!(
        result.error.as_deref(),
        Some("Failed to start recreated container 'api'")
    );
}

#[tokio::test]
async fn test_scenario_crash_after_rename_is_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Arc::new(InMemoryRuntime::new());
    let old_id = running_api(&runtime);

    // Previous process: stopped, renamed, journaled, then died.
    {
        let journal = RecoveryJournal::open(dir.path());
        runtime.stop_container(&old_id, Duration::from_secs(10)).await.unwrap();
        runtime.rename_container(&old_id, "api__pre_update").await.unwrap();
        journal.begin_recreation(RecoveryEntry::renamed(
            "api",
            "api:latest",
            old_id.clone(),
            true,
            false,
        ));
    }
    runtime.clear_calls();
    let notifier = Arc::new(RecordingNotifier::default());

    worker(&runtime, options(&dir), &notifier)
        .run(&CancellationToken::new())
        .await;

    let calls = runtime.calls();
    assert_eq!(
        &calls[..3],
        &[
            RuntimeCall::InspectContainer(old_id.clone()),
            RuntimeCall::RenameContainer {
                id: old_id.clone(),
                new_name: "api".into()
            },
            RuntimeCall::StartContainer(old_id.clone()),
        ]
    );
    let api = runtime.container("api").unwrap();
    assert_eq!(api.id, old_id);
    assert!(api.running);
    assert!(RecoveryJournal::open(dir.path()).is_empty());

    // The session after recovery sees the restored container as current.
    let recorded = notifier.sessions.lock().unwrap().clone();
    assert_eq!(recorded[0].results[0].state, ContainerUpdateState::Fresh);
}

#[tokio::test]
async fn test_worker_loops_until_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Arc::new(InMemoryRuntime::new());
    running_api(&runtime);
    let cancel = CancellationToken::new();
    let notifier = Arc::new(RecordingNotifier {
        cancel_after: Some(cancel.clone()),
        ..Default::default()
    });
    let options = UpdaterOptions {
        run_once: false,
        poll_interval: Duration::from_secs(3600),
        ..options(&dir)
    };

    let sessions = worker(&runtime, options, &notifier).run(&cancel).await;

    assert_eq!(sessions, 1);
    assert_eq!(notifier.sessions.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_worker_survives_failed_listing() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Arc::new(InMemoryRuntime::new());
    runtime.fail_next(refit_runtime::Operation::List, "daemon down");
    let notifier = Arc::new(RecordingNotifier::default());

    let sessions = worker(&runtime, options(&dir), &notifier)
        .run(&CancellationToken::new())
        .await;

    assert_eq!(sessions, 1);
    assert!(notifier.sessions.lock().unwrap().is_empty());
}
