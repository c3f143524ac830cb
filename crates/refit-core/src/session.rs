use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerUpdateState {
    Fresh,
    Updated,
    Skipped,
    Failed,
}

impl fmt::Display for ContainerUpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            ContainerUpdateState::Fresh => "Fresh",
            ContainerUpdateState::Updated => "Updated",
            ContainerUpdateState::Skipped => "Skipped",
            ContainerUpdateState::Failed => "Failed",
        };
        f.write_str(state)
    }
}

/// Outcome for a single container within a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerUpdateResult {
    pub name: String,
    pub image: String,
    pub state: ContainerUpdateState,
    /// Failure reason, or a note for non-failed states
    pub error: Option<String>,
}

impl ContainerUpdateResult {
    pub fn new(name: impl Into<String>, image: impl Into<String>, state: ContainerUpdateState) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            state,
            error: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }
}

/// Aggregate of one pass over the monitored containers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSessionResult {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<ContainerUpdateResult>,
}

impl UpdateSessionResult {
    pub fn new(
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        results: Vec<ContainerUpdateResult>,
    ) -> Self {
        Self {
            started_at,
            finished_at,
            results,
        }
    }

    pub fn scanned(&self) -> usize {
        self.results.len()
    }

    pub fn updated(&self) -> usize {
        self.count(ContainerUpdateState::Updated)
    }

    pub fn failed(&self) -> usize {
        self.count(ContainerUpdateState::Failed)
    }

    fn count(&self, state: ContainerUpdateState) -> usize {
        self.results.iter().filter(|r| r.state == state).count()
    }

    pub fn result_for(&self, name: &str) -> Option<&ContainerUpdateResult> {
        self.results.iter().find(|r| r.name == name)
    }
}
