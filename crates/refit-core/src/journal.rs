//! Durable record of in-flight container recreations.
//!
//! One entry per container name. The entry is written right after the
//! original container has been parked under its backup name and is removed
//! once the recreation has either fully succeeded or been rolled back, so a
//! process that dies in between can find out on restart what it was doing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

pub const JOURNAL_FILE_NAME: &str = "recovery-journal.json";

/// How far a recreation got. Only ever advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecoveryPhase {
    /// Original container renamed to its backup name
    Renamed,
    /// Replacement container exists
    Created,
    /// Replacement container started
    Started,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryEntry {
    pub container_name: String,
    pub image_name: String,
    pub backup_container_id: String,
    pub new_container_id: Option<String>,
    pub was_running: bool,
    pub revive_stopped: bool,
    pub phase: RecoveryPhase,
    pub timestamp: DateTime<Utc>,
}

impl RecoveryEntry {
    /// Entry for a container that has just been renamed out of the way.
    pub fn renamed(
        container_name: impl Into<String>,
        image_name: impl Into<String>,
        backup_container_id: impl Into<String>,
        was_running: bool,
        revive_stopped: bool,
    ) -> Self {
        Self {
            container_name: container_name.into(),
            image_name: image_name.into(),
            backup_container_id: backup_container_id.into(),
            new_container_id: None,
            was_running,
            revive_stopped,
            phase: RecoveryPhase::Renamed,
            timestamp: Utc::now(),
        }
    }

    /// Name the original container is parked under during recreation
    pub fn backup_name(&self) -> String {
        crate::recreate::backup_name(&self.container_name)
    }

    /// Whether the replacement is supposed to end up running
    pub fn should_start(&self) -> bool {
        self.was_running || self.revive_stopped
    }
}

/// In-memory list of entries mirrored to a JSON file after every mutation.
///
/// All access goes through a single mutex; file I/O is synchronous and
/// happens while the lock is held.
pub struct RecoveryJournal {
    path: PathBuf,
    entries: Mutex<Vec<RecoveryEntry>>,
}

impl RecoveryJournal {
    /// Open the journal under `data_dir`, loading whatever a previous run left.
    ///
    /// Never fails: an unreadable or corrupt file is logged and treated as
    /// empty, and a data directory that cannot be created only costs
    /// durability.
    pub fn open(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        if let Err(e) = fs::create_dir_all(data_dir) {
            error!("Failed to create data directory {}: {}", data_dir.display(), e);
        }

        let path = data_dir.join(JOURNAL_FILE_NAME);
        let entries = Self::load(&path);
        if !entries.is_empty() {
            info!(
                "Recovery journal loaded with {} pending entry/entries from {}",
                entries.len(),
                path.display()
            );
        }

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecoveryEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of all current entries
    pub fn pending_entries(&self) -> Vec<RecoveryEntry> {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Record a fresh recreation, replacing any earlier entry for the same name.
    pub fn begin_recreation(&self, mut entry: RecoveryEntry) {
        entry.phase = RecoveryPhase::Renamed;
        let mut entries = self.lock();
        entries.retain(|e| e.container_name != entry.container_name);
        debug!("Journal: begin recreation of {}", entry.container_name);
        entries.push(entry);
        self.flush(&entries);
    }

    pub fn record_created(&self, container_name: &str, new_container_id: &str) {
        let mut entries = self.lock();
        match entries.iter_mut().find(|e| e.container_name == container_name) {
            Some(entry) => {
                entry.new_container_id = Some(new_container_id.to_string());
                entry.phase = entry.phase.max(RecoveryPhase::Created);
                self.flush(&entries);
            }
            None => warn!(
                "Journal: no pending entry for {} when recording creation",
                container_name
            ),
        }
    }

    pub fn record_started(&self, container_name: &str) {
        let mut entries = self.lock();
        match entries.iter_mut().find(|e| e.container_name == container_name) {
            Some(entry) => {
                entry.phase = RecoveryPhase::Started;
                self.flush(&entries);
            }
            None => warn!(
                "Journal: no pending entry for {} when recording start",
                container_name
            ),
        }
    }

    /// Drop the entry for `container_name`; the recreation is resolved.
    pub fn complete(&self, container_name: &str) {
        let mut entries = self.lock();
        entries.retain(|e| e.container_name != container_name);
        self.flush(&entries);
    }

    fn load(path: &Path) -> Vec<RecoveryEntry> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(
                    "Could not read recovery journal at {}: {}. Starting fresh",
                    path.display(),
                    e
                );
                return Vec::new();
            }
        };

        match serde_json::from_str::<Option<Vec<RecoveryEntry>>>(&contents) {
            Ok(entries) => entries.unwrap_or_default(),
            Err(e) => {
                warn!(
                    "Could not parse recovery journal at {}: {}. Starting fresh",
                    path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    /// Write-then-rename so the file on disk is always a complete version.
    /// Failure only weakens durability; the in-memory state stays authoritative.
    fn flush(&self, entries: &[RecoveryEntry]) {
        if let Err(e) = self.write_atomically(entries) {
            error!(
                "Failed to persist recovery journal to {}: {}",
                self.path.display(),
                e
            );
        }
    }

    fn write_atomically(&self, entries: &[RecoveryEntry]) -> io::Result<()> {
        let json = serde_json::to_string_pretty(entries)?;
        let mut temp_path = self.path.clone().into_os_string();
        temp_path.push(".tmp");
        let temp_path = PathBuf::from(temp_path);

        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &self.path)
    }
}
