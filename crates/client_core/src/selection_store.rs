//! Bookmark of the last selected queue, kept across sessions.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::warn;

use crate::{
    error::{ClientError, ClientResult},
    types::SavedSelection,
};

pub trait SelectionStore: Send + Sync {
    fn save(&self, selection: &SavedSelection) -> ClientResult<()>;
    /// Missing, unreadable or corrupt data loads as `None`.
    fn load(&self) -> Option<SavedSelection>;
    fn clear(&self) -> ClientResult<()>;
}

pub struct FileSelectionStore {
    path: PathBuf,
}

impl FileSelectionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SelectionStore for FileSelectionStore {
    fn save(&self, selection: &SavedSelection) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ClientError::Store(format!(
                    "failed to create directory '{}': {e}",
                    parent.display()
                ))
            })?;
        }
        let raw = serde_json::to_string(selection)
            .map_err(|e| ClientError::Store(format!("failed to encode selection: {e}")))?;
        fs::write(&self.path, raw).map_err(|e| {
            ClientError::Store(format!("failed to write '{}': {e}", self.path.display()))
        })
    }

    fn load(&self) -> Option<SavedSelection> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to read saved selection");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(selection) => Some(selection),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "ignoring corrupt saved selection");
                None
            }
        }
    }

    fn clear(&self) -> ClientResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ClientError::Store(format!(
                "failed to remove '{}': {err}",
                self.path.display()
            ))),
        }
    }
}

#[derive(Default)]
pub struct MemorySelectionStore {
    slot: Mutex<Option<String>>,
}

impl MemorySelectionStore {
    /// Seeds the store with raw text, as if it had been written earlier.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(raw.into())),
        }
    }
}

impl SelectionStore for MemorySelectionStore {
    fn save(&self, selection: &SavedSelection) -> ClientResult<()> {
        let raw = serde_json::to_string(selection)
            .map_err(|e| ClientError::Store(format!("failed to encode selection: {e}")))?;
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| ClientError::Store("selection slot poisoned".into()))?;
        *slot = Some(raw);
        Ok(())
    }

    fn load(&self) -> Option<SavedSelection> {
        let slot = self.slot.lock().ok()?;
        serde_json::from_str(slot.as_deref()?).ok()
    }

    fn clear(&self) -> ClientResult<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| ClientError::Store("selection slot poisoned".into()))?;
        *slot = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/selection_store_tests.rs"]
mod tests;
