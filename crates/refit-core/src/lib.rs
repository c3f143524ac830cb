pub mod auth;
pub mod coordinator;
pub mod error;
pub mod journal;
pub mod notify;
pub mod options;
pub mod recovery;
pub mod recreate;
pub mod rollback;
pub mod schedule;
pub mod selection;
pub mod self_update;
pub mod session;
pub mod worker;

pub use auth::RegistryAuthResolver;
pub use coordinator::UpdateCoordinator;
pub use error::{Result, UpdateError};
pub use journal::{RecoveryEntry, RecoveryJournal, RecoveryPhase};
pub use notify::{compose_message, CompositeNotifier, NoopNotifier, Notifier, WebhookNotifier};
pub use options::{NameSet, UpdaterOptions};
pub use recovery::RecoveryProcessor;
pub use recreate::{ContainerRecreator, BACKUP_SUFFIX};
pub use rollback::rollback;
pub use schedule::RunScheduler;
pub use selection::ContainerSelectionPolicy;
pub use self_update::SelfUpdateLauncher;
pub use session::{ContainerUpdateResult, ContainerUpdateState, UpdateSessionResult};
pub use worker::Worker;
