//! Session identity store.
//!
//! Every event carries a session id that correlates the events of one
//! browsing session. The id is minted lazily on first use, persisted
//! immediately under the fixed key [`SESSION_KEY`], and reused afterwards.
//!
//! # Degraded mode
//!
//! Storage failures never reach the caller. If the slot cannot be read, a
//! throwaway id is minted for that call only; if it cannot be written, the
//! freshly minted id is still returned. Correlation across calls is lost in
//! both cases but tracking keeps working.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use insightx_tracker::session::{MemoryStorage, SessionIdentity};
//!
//! let identity = SessionIdentity::new(Arc::new(MemoryStorage::new()));
//!
//! let first = identity.get_or_create_session_id();
//! let second = identity.get_or_create_session_id();
//! assert_eq!(first, second);
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Well-known storage key for the session identifier.
pub const SESSION_KEY: &str = "ix_session_id";

/// Errors raised by a [`KeyValueStorage`] backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backing file could not be read or written.
    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),

    /// Storage is disabled or otherwise unreachable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Client-local key-value slot storage.
pub trait KeyValueStorage: Send + Sync {
    /// Reads the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// File-backed storage: one file per key inside a state directory.
///
/// Survives process restarts, which plays the role of a page reload.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Creates storage rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the state directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.slot_path(key)) {
            Ok(contents) => Ok(Some(contents.trim().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.slot_path(key), value)?;
        Ok(())
    }
}

/// In-memory storage, scoped to the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let slots = self
            .slots
            .lock()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".to_string()))?;
        Ok(slots.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".to_string()))?;
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Hands out the session id, creating and persisting it on first need.
#[derive(Clone)]
pub struct SessionIdentity {
    storage: Arc<dyn KeyValueStorage>,
}

impl SessionIdentity {
    /// Creates a session identity over the given storage.
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// Returns the persisted session id, minting and persisting one if absent.
    ///
    /// Never fails: storage errors degrade to a throwaway id.
    #[must_use]
    pub fn get_or_create_session_id(&self) -> String {
        match self.storage.get(SESSION_KEY) {
            Ok(Some(existing)) if !existing.trim().is_empty() => existing,
            Ok(_) => {
                let fresh = generate_session_id();
                match self.storage.set(SESSION_KEY, &fresh) {
                    Ok(()) => debug!(session_id = %fresh, "Created session id"),
                    Err(e) => warn!(
                        error = %e,
                        "Failed to persist session id, correlation limited to this call"
                    ),
                }
                fresh
            }
            Err(e) => {
                warn!(error = %e, "Session storage unavailable, using throwaway id");
                generate_session_id()
            }
        }
    }
}

impl std::fmt::Debug for SessionIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIdentity").finish_non_exhaustive()
    }
}

/// Generates a fresh random session token.
fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Storage whose reads and/or writes always fail.
    struct BrokenStorage {
        fail_reads: bool,
    }

    impl KeyValueStorage for BrokenStorage {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            if self.fail_reads {
                Err(StorageError::Unavailable("disabled".to_string()))
            } else {
                Ok(None)
            }
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        }
    }

    #[test]
    fn repeated_calls_return_same_id() {
        let identity = SessionIdentity::new(Arc::new(MemoryStorage::new()));

        let first = identity.get_or_create_session_id();
        let second = identity.get_or_create_session_id();

        assert_eq!(first, second);
    }

    #[test]
    fn fresh_id_is_a_valid_uuid_and_persisted() {
        let storage = Arc::new(MemoryStorage::new());
        let identity = SessionIdentity::new(storage.clone());

        let id = identity.get_or_create_session_id();

        assert!(Uuid::parse_str(&id).is_ok());
        assert_eq!(storage.get(SESSION_KEY).unwrap(), Some(id));
    }

    #[test]
    fn existing_value_is_returned_unchanged() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(SESSION_KEY, "legacy-session").unwrap();

        let identity = SessionIdentity::new(storage);
        assert_eq!(identity.get_or_create_session_id(), "legacy-session");
    }

    #[test]
    fn empty_slot_is_treated_as_absent() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(SESSION_KEY, "").unwrap();

        let identity = SessionIdentity::new(storage.clone());
        let id = identity.get_or_create_session_id();

        assert!(!id.is_empty());
        assert_eq!(storage.get(SESSION_KEY).unwrap(), Some(id));
    }

    #[test]
    fn unreadable_storage_degrades_to_throwaway_ids() {
        let identity = SessionIdentity::new(Arc::new(BrokenStorage { fail_reads: true }));

        let first = identity.get_or_create_session_id();
        let second = identity.get_or_create_session_id();

        assert!(!first.is_empty());
        assert!(!second.is_empty());
        assert_ne!(first, second);
    }

    #[test]
    fn unwritable_storage_still_returns_an_id() {
        let identity = SessionIdentity::new(Arc::new(BrokenStorage { fail_reads: false }));
        assert!(!identity.get_or_create_session_id().is_empty());
    }

    #[test]
    fn file_storage_survives_reload() {
        let dir = TempDir::new().expect("temp dir");

        let first = SessionIdentity::new(Arc::new(FileStorage::new(dir.path())))
            .get_or_create_session_id();

        // A new store over the same directory stands in for a page reload.
        let reloaded = SessionIdentity::new(Arc::new(FileStorage::new(dir.path())))
            .get_or_create_session_id();

        assert_eq!(first, reloaded);
        assert!(dir.path().join(SESSION_KEY).exists());
    }

    #[test]
    fn file_storage_creates_missing_directory() {
        let dir = TempDir::new().expect("temp dir");
        let nested = dir.path().join("state").join("insightx");
        let storage = FileStorage::new(&nested);

        assert_eq!(storage.get(SESSION_KEY).unwrap(), None);
        storage.set(SESSION_KEY, "abc").unwrap();
        assert_eq!(storage.get(SESSION_KEY).unwrap(), Some("abc".to_string()));
    }

    #[test]
    fn file_storage_trims_trailing_newline() {
        let dir = TempDir::new().expect("temp dir");
        fs::write(dir.path().join(SESSION_KEY), "edited-by-hand\n").unwrap();

        let storage = FileStorage::new(dir.path());
        assert_eq!(
            storage.get(SESSION_KEY).unwrap(),
            Some("edited-by-hand".to_string())
        );
    }

    #[test]
    fn file_storage_read_error_on_directory_slot() {
        let dir = TempDir::new().expect("temp dir");
        fs::create_dir_all(dir.path().join(SESSION_KEY)).unwrap();

        let storage = FileStorage::new(dir.path());
        assert!(matches!(storage.get(SESSION_KEY), Err(StorageError::Io(_))));

        // Identity still produces an id.
        let identity = SessionIdentity::new(Arc::new(storage));
        assert!(!identity.get_or_create_session_id().is_empty());
    }
}
