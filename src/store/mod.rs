//! Local persistence: a key-value slot plus the two collections kept in it.
//!
//! Every mutation rewrites the whole collection. Write failures are logged and
//! otherwise ignored; the in-memory copy stays authoritative for the session.

mod conversation;
mod gallery;

pub use conversation::{CONVERSATION_KEY, ConversationStore, WELCOME_ID, WELCOME_TEXT, welcome_message};
pub use gallery::{GALLERY_KEY, Gallery};

use std::collections::HashMap;
use std::sync::Mutex;

#[cfg(not(target_arch = "wasm32"))]
use std::{fs, io, path::PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[cfg(not(target_arch = "wasm32"))]
    #[error("storage io failed: {0}")]
    Io(#[from] io::Error),

    #[error("storage encoding failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("storage is unavailable: {0}")]
    Unavailable(String),
}

/// A string-valued storage slot, keyed by name.
pub trait KeyValueSlot: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
    fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

/// In-memory slot, for tests and hosts with nothing to persist to.
#[derive(Default)]
pub struct MemorySlot {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueSlot for MemorySlot {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

/// One JSON file per key under a directory.
#[cfg(not(target_arch = "wasm32"))]
pub struct FileSlot {
    dir: PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl FileSlot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<local data dir>/folio/chat`, or `cache/chat` when the platform has none.
    pub fn platform_default() -> Self {
        let dir = dirs::data_local_dir()
            .map(|dir| dir.join("folio").join("chat"))
            .unwrap_or_else(|| PathBuf::from("cache").join("chat"));
        Self::new(dir)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl KeyValueSlot for FileSlot {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        match fs::remove_file(self.path_for(key)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

/// The browser's `localStorage`, looked up on every call.
#[cfg(target_arch = "wasm32")]
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalStorageSlot;

#[cfg(target_arch = "wasm32")]
impl LocalStorageSlot {
    pub fn new() -> Self {
        Self
    }

    fn storage() -> Result<web_sys::Storage, PersistenceError> {
        let window = web_sys::window()
            .ok_or_else(|| PersistenceError::Unavailable("no window".to_string()))?;
        window
            .local_storage()
            .map_err(|err| PersistenceError::Unavailable(format!("{err:?}")))?
            .ok_or_else(|| PersistenceError::Unavailable("localStorage is disabled".to_string()))
    }
}

#[cfg(target_arch = "wasm32")]
impl KeyValueSlot for LocalStorageSlot {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Self::storage()?
            .get_item(key)
            .map_err(|err| PersistenceError::Unavailable(format!("{err:?}")))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|err| PersistenceError::Unavailable(format!("{err:?}")))
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        Self::storage()?
            .remove_item(key)
            .map_err(|err| PersistenceError::Unavailable(format!("{err:?}")))
    }
}

/// Sanitize storage key for filesystem use
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect()
}

/// Read and decode a collection. Absent, unreadable, or corrupt data all
/// count as "nothing stored".
fn load_collection<T: serde::de::DeserializeOwned>(slot: &dyn KeyValueSlot, key: &str) -> Option<Vec<T>> {
    let raw = match slot.read(key) {
        Ok(raw) => raw?,
        Err(err) => {
            tracing::warn!(key, "failed to read stored collection: {err}");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(items) => Some(items),
        Err(err) => {
            tracing::warn!(key, "discarding corrupt stored collection: {err}");
            None
        }
    }
}

/// Rewrite a whole collection, logging instead of failing.
fn persist_collection<T: serde::Serialize>(slot: &dyn KeyValueSlot, key: &str, items: &[T]) {
    let result = serde_json::to_string(items)
        .map_err(PersistenceError::from)
        .and_then(|json| slot.write(key, &json));
    if let Err(err) = result {
        tracing::warn!(key, "failed to persist collection: {err}");
    }
}

fn erase_collection(slot: &dyn KeyValueSlot, key: &str) {
    if let Err(err) = slot.remove(key) {
        tracing::warn!(key, "failed to erase collection: {err}");
    }
}
