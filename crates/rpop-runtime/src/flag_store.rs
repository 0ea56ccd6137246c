//! Boolean flag storage for popup visibility state.
//!
//! The popup remembers two facts between calls: whether it was already shown
//! in this session, and whether the user asked never to see it again. Both
//! live in a [`FlagStore`], a tiny key-value store of string values where a
//! flag counts as set only when its value is exactly [`FLAG_TRUE`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        FlagStore                              │
//! │   - get / set / remove raw string values                      │
//! │   - is_flag_set / set_flag helpers ("true" ⇔ set)             │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!              ┌───────────────┴────────────────┐
//!              ▼                                ▼
//! ┌────────────────────────────┐  ┌────────────────────────────────┐
//! │ MemoryFlagStore            │  │ FileFlagStore                  │
//! │ session scope, clear() to  │  │ JSON file, survives restarts   │
//! │ end the session            │  │ (requires state-persistence)   │
//! └────────────────────────────┘  └────────────────────────────────┘
//! ```
//!
//! # Design Invariants
//!
//! 1. **Bit-compatible values**: flags are written as the string `"true"` and
//!    any other stored value reads as unset.
//! 2. **Graceful degradation**: Storage failures never panic; operations return `Result`.
//! 3. **Atomic writes**: File storage uses write-rename pattern to prevent corruption.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `StorageError::Io` | File I/O failure | Returns error, file unaffected |
//! | `StorageError::Serialization` | JSON encode/decode | Returns error |
//! | `StorageError::Corruption` | Poisoned lock | Returns error |
//! | Missing key | First run, reset | Reads as unset |

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// The stored value that marks a flag as set.
pub const FLAG_TRUE: &str = "true";

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during flag storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error during file operations.
    Io(std::io::Error),
    /// Serialization or deserialization error.
    #[cfg(feature = "state-persistence")]
    Serialization(String),
    /// Store contents or locks are in an invalid state.
    Corruption(String),
    /// Backend is not available (e.g., storage disabled by the host).
    Unavailable(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "state-persistence")]
            StorageError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            StorageError::Corruption(msg) => write!(f, "storage corruption: {msg}"),
            StorageError::Unavailable(msg) => write!(f, "storage unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            #[cfg(feature = "state-persistence")]
            StorageError::Serialization(_) => None,
            StorageError::Corruption(_) => None,
            StorageError::Unavailable(_) => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// ─────────────────────────────────────────────────────────────────────────────
// Flag Store Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Key-value storage of string-valued flags.
///
/// Implementations use interior mutability so a store can be shared between
/// the popup controller and the embedding host (e.g. behind an `Arc`).
pub trait FlagStore: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Read the raw value stored under `key`, if any.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Whether the flag under `key` is set (stored value is exactly `"true"`).
    fn is_flag_set(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.as_deref() == Some(FLAG_TRUE))
    }

    /// Set the flag under `key`.
    fn set_flag(&self, key: &str) -> StorageResult<()> {
        self.set(key, FLAG_TRUE)
    }
}

impl<T: FlagStore + ?Sized> FlagStore for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }
}

impl<T: FlagStore + ?Sized> FlagStore for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory Store (always available)
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory flag store.
///
/// This is the session-scoped store: its contents live as long as the value
/// does, and [`clear`](Self::clear) ends the session. Also useful for tests
/// and for hosts without durable storage.
#[derive(Default)]
pub struct MemoryFlagStore {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryFlagStore {
    /// Create a new empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory store pre-populated with raw values.
    #[must_use]
    pub fn with_values<K, V>(values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let data = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            data: RwLock::new(data),
        }
    }

    /// Drop every stored value (ends the session).
    pub fn clear(&self) -> StorageResult<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        guard.clear();
        Ok(())
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().map(|g| g.len()).unwrap_or(0)
    }

    /// Whether no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FlagStore for MemoryFlagStore {
    fn name(&self) -> &str {
        "MemoryFlagStore"
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let guard = self
            .data
            .read()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        guard.remove(key);
        Ok(())
    }
}

impl fmt::Debug for MemoryFlagStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryFlagStore")
            .field("entries", &self.len())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Store (requires state-persistence feature)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "state-persistence")]
mod file_store {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::fs::{self, File};
    use std::io::{BufReader, BufWriter, Write};
    use std::path::{Path, PathBuf};

    /// On-disk format (JSON).
    #[derive(Serialize, Deserialize)]
    struct FlagFile {
        /// Format version for future migrations.
        format_version: u32,
        /// Raw key -> value map.
        flags: HashMap<String, String>,
    }

    impl FlagFile {
        const FORMAT_VERSION: u32 = 1;

        fn new() -> Self {
            Self {
                format_version: Self::FORMAT_VERSION,
                flags: HashMap::new(),
            }
        }
    }

    /// Durable flag store backed by a JSON file.
    ///
    /// Every mutation rewrites the whole file with the write-rename pattern,
    /// so a crash mid-write leaves the previous contents intact.
    ///
    /// # File Format
    ///
    /// ```json
    /// {
    ///   "format_version": 1,
    ///   "flags": {
    ///     "stormscan_review_never_show": "true"
    ///   }
    /// }
    /// ```
    pub struct FileFlagStore {
        path: PathBuf,
    }

    impl FileFlagStore {
        /// Create a file store at the given path.
        ///
        /// The file does not need to exist; it will be created on first write.
        #[must_use]
        pub fn new(path: impl AsRef<Path>) -> Self {
            Self {
                path: path.as_ref().to_path_buf(),
            }
        }

        /// Create a store at the default location for the application.
        ///
        /// Uses `$XDG_STATE_HOME/rpop/{app_name}/flags.json`, falling back to
        /// `~/.local/state` and finally the current directory.
        #[must_use]
        pub fn default_for_app(app_name: &str) -> Self {
            let base = dirs_or_fallback();
            let path = base.join("rpop").join(app_name).join("flags.json");
            Self { path }
        }

        /// Path of the backing file.
        #[must_use]
        pub fn path(&self) -> &Path {
            &self.path
        }

        fn temp_path(&self) -> PathBuf {
            let mut tmp = self.path.clone();
            tmp.set_extension("json.tmp");
            tmp
        }

        fn load(&self) -> StorageResult<FlagFile> {
            if !self.path.exists() {
                return Ok(FlagFile::new());
            }

            let file = File::open(&self.path)?;
            let reader = BufReader::new(file);
            let flag_file: FlagFile = serde_json::from_reader(reader).map_err(|e| {
                StorageError::Serialization(format!("failed to parse flag file: {e}"))
            })?;

            if flag_file.format_version != FlagFile::FORMAT_VERSION {
                tracing::warn!(
                    stored = flag_file.format_version,
                    expected = FlagFile::FORMAT_VERSION,
                    "flag file format version mismatch, ignoring stored flags"
                );
                return Ok(FlagFile::new());
            }

            Ok(flag_file)
        }

        fn save(&self, flag_file: &FlagFile) -> StorageResult<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }

            let tmp_path = self.temp_path();
            {
                let file = File::create(&tmp_path)?;
                let mut writer = BufWriter::new(file);
                serde_json::to_writer_pretty(&mut writer, flag_file).map_err(|e| {
                    StorageError::Serialization(format!("failed to serialize flags: {e}"))
                })?;
                writer.flush()?;
                writer.get_ref().sync_all()?;
            }

            fs::rename(&tmp_path, &self.path)?;

            tracing::debug!(
                path = %self.path.display(),
                entries = flag_file.flags.len(),
                "saved popup flags"
            );
            Ok(())
        }
    }

    /// Get state directory, falling back to current dir if unavailable.
    fn dirs_or_fallback() -> PathBuf {
        if let Ok(state_home) = std::env::var("XDG_STATE_HOME") {
            return PathBuf::from(state_home);
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local").join("state");
        }
        PathBuf::from(".")
    }

    impl FlagStore for FileFlagStore {
        fn name(&self) -> &str {
            "FileFlagStore"
        }

        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            Ok(self.load()?.flags.remove(key))
        }

        fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            let mut flag_file = self.load()?;
            flag_file.flags.insert(key.to_owned(), value.to_owned());
            self.save(&flag_file)
        }

        fn remove(&self, key: &str) -> StorageResult<()> {
            let mut flag_file = self.load()?;
            if flag_file.flags.remove(key).is_none() {
                return Ok(());
            }
            self.save(&flag_file)
        }
    }

    impl fmt::Debug for FileFlagStore {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("FileFlagStore")
                .field("path", &self.path)
                .finish()
        }
    }
}

#[cfg(feature = "state-persistence")]
pub use file_store::FileFlagStore;

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "stormscan_review_never_show";

    #[test]
    fn memory_store_starts_empty() {
        let store = MemoryFlagStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get(KEY).unwrap(), None);
        assert!(!store.is_flag_set(KEY).unwrap());
    }

    #[test]
    fn set_flag_writes_literal_true() {
        let store = MemoryFlagStore::new();
        store.set_flag(KEY).unwrap();
        assert_eq!(store.get(KEY).unwrap().as_deref(), Some("true"));
        assert!(store.is_flag_set(KEY).unwrap());
    }

    #[test]
    fn only_exact_true_counts_as_set() {
        let store = MemoryFlagStore::with_values([
            ("upper", "TRUE"),
            ("one", "1"),
            ("false", "false"),
            ("padded", " true"),
        ]);
        for key in ["upper", "one", "false", "padded"] {
            assert!(!store.is_flag_set(key).unwrap(), "{key} must read as unset");
        }
    }

    #[test]
    fn remove_missing_key_is_ok() {
        let store = MemoryFlagStore::new();
        store.remove(KEY).unwrap();
        store.set_flag(KEY).unwrap();
        store.remove(KEY).unwrap();
        assert!(!store.is_flag_set(KEY).unwrap());
    }

    #[test]
    fn clear_ends_session() {
        let store = MemoryFlagStore::new();
        store.set_flag("a").unwrap();
        store.set_flag("b").unwrap();
        assert_eq!(store.len(), 2);
        store.clear().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn arc_shares_state() {
        let store = Arc::new(MemoryFlagStore::new());
        let handle: Box<dyn FlagStore> = Box::new(Arc::clone(&store));
        handle.set_flag(KEY).unwrap();
        assert!(store.is_flag_set(KEY).unwrap());
        assert_eq!(handle.name(), "MemoryFlagStore");
    }

    #[test]
    fn storage_error_display() {
        let err = StorageError::Unavailable("private mode".into());
        assert_eq!(err.to_string(), "storage unavailable: private mode");
        let io = StorageError::from(std::io::Error::other("disk"));
        assert!(std::error::Error::source(&io).is_some());
    }
}
