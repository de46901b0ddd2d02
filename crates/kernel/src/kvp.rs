//! Key/value stores.
//!
//! Two flavours share one key discipline:
//! - runtime: in-memory, lost when the process exits;
//! - persistent: one JSON file per key under `<user>/kvp/`, written through a
//!   temporary file and renamed into place so readers never see a partial
//!   value.
//!
//! Keys are validated before any filesystem access. Lookups of keys that do
//! not exist are not errors.

use std::io::Write;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

/// File extension of persistent entries.
const ENTRY_EXTENSION: &str = "json";

/// Errors from the key/value stores.
#[derive(Debug, Error)]
pub enum KvpError {
    #[error("key must not be empty")]
    EmptyKey,

    #[error("key '{0}' contains NUL")]
    NulInKey(String),

    #[error("key '{0}' must not contain path separators")]
    SeparatorInKey(String),

    #[error("invalid key pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("kvp I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("kvp entry {path} is not valid JSON: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl KvpError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Reject keys that are empty or could name a file outside the store.
pub fn validate_key(key: &str) -> Result<(), KvpError> {
    if key.is_empty() {
        return Err(KvpError::EmptyKey);
    }
    if key.contains('\0') {
        return Err(KvpError::NulInKey(key.to_string()));
    }
    if key.contains('/') || key.contains(std::path::MAIN_SEPARATOR) || key == "." || key == ".." {
        return Err(KvpError::SeparatorInKey(key.to_string()));
    }
    Ok(())
}

fn compile_pattern(pattern: &str) -> Result<glob::Pattern, KvpError> {
    glob::Pattern::new(pattern).map_err(|source| KvpError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Runtime and persistent key/value storage.
#[derive(Debug)]
pub struct KvpStore {
    dir: PathBuf,
    runtime: DashMap<String, Value>,
    /// Serializes persistent writes and deletes.
    persistent_lock: Mutex<()>,
}

impl KvpStore {
    /// Store persisting under `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            runtime: DashMap::new(),
            persistent_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn get_runtime(&self, key: &str) -> Option<Value> {
        self.runtime.get(key).map(|v| v.value().clone())
    }

    pub fn set_runtime(&self, key: &str, value: Value) -> Result<(), KvpError> {
        validate_key(key)?;
        self.runtime.insert(key.to_string(), value);
        Ok(())
    }

    pub fn remove_runtime(&self, key: &str) -> Option<Value> {
        self.runtime.remove(key).map(|(_, v)| v)
    }

    /// Runtime keys matching a glob pattern, sorted. An empty pattern finds nothing.
    pub fn find_runtime(&self, pattern: &str) -> Result<Vec<String>, KvpError> {
        if pattern.is_empty() {
            return Ok(Vec::new());
        }
        let pattern = compile_pattern(pattern)?;
        let mut keys: Vec<String> = self
            .runtime
            .iter()
            .filter(|entry| pattern.matches(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf, KvpError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.{ENTRY_EXTENSION}")))
    }

    pub fn get_persistent(&self, key: &str) -> Result<Option<Value>, KvpError> {
        let path = self.entry_path(key)?;
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(KvpError::io(&path, e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| KvpError::Decode { path, source })
    }

    pub fn set_persistent(&self, key: &str, value: &Value) -> Result<(), KvpError> {
        let path = self.entry_path(key)?;
        let _guard = self.persistent_lock.lock();

        std::fs::create_dir_all(&self.dir).map_err(|e| KvpError::io(&self.dir, e))?;
        let mut tmp = tempfile::Builder::new()
            .prefix(&format!("{key}."))
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(|e| KvpError::io(&self.dir, e))?;
        write_entry(&mut tmp, value, &path)?;
        tmp.persist(&path)
            .map_err(|e| KvpError::io(&path, e.error))?;

        debug!(key = %key, path = %path.display(), "persistent kvp entry written");
        Ok(())
    }

    /// Remove a persistent entry. Returns whether one existed.
    pub fn remove_persistent(&self, key: &str) -> Result<bool, KvpError> {
        let path = self.entry_path(key)?;
        let _guard = self.persistent_lock.lock();
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(KvpError::io(&path, e)),
        }
    }

    /// Persistent keys matching a glob pattern, sorted.
    pub fn find_persistent(&self, pattern: &str) -> Result<Vec<String>, KvpError> {
        if pattern.is_empty() || !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let pattern = compile_pattern(pattern)?;

        let entries = std::fs::read_dir(&self.dir).map_err(|e| KvpError::io(&self.dir, e))?;
        let mut keys: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXTENSION))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .filter(|key| pattern.matches(key))
            .collect();
        keys.sort();
        Ok(keys)
    }
}

fn write_entry(tmp: &mut NamedTempFile, value: &Value, path: &Path) -> Result<(), KvpError> {
    let body = serde_json::to_vec(value).map_err(|source| KvpError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let file = tmp.as_file_mut();
    file.write_all(&body)
        .and_then(|()| file.sync_all())
        .map_err(|e| KvpError::io(path, e))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_validated_before_io() {
        assert!(matches!(validate_key(""), Err(KvpError::EmptyKey)));
        assert!(matches!(validate_key("a\0b"), Err(KvpError::NulInKey(_))));
        assert!(matches!(validate_key("a/b"), Err(KvpError::SeparatorInKey(_))));
        assert!(matches!(validate_key(".."), Err(KvpError::SeparatorInKey(_))));
        assert!(validate_key("chat.branch-1").is_ok());

        let store = KvpStore::new("/nonexistent/kvp");
        assert!(store.set_persistent("../escape", &json!(1)).is_err());
        assert!(store.set_runtime("", json!(1)).is_err());
    }

    #[test]
    fn runtime_store_round_trip_and_find() {
        let store = KvpStore::new("/unused");
        store.set_runtime("tts.voice", json!("alto")).unwrap();
        store.set_runtime("tts.rate", json!(1.2)).unwrap();
        store.set_runtime("chat.last", json!(null)).unwrap();

        assert_eq!(store.get_runtime("tts.voice"), Some(json!("alto")));
        assert_eq!(store.find_runtime("tts.*").unwrap(), vec!["tts.rate", "tts.voice"]);
        assert!(store.find_runtime("").unwrap().is_empty());

        assert_eq!(store.remove_runtime("tts.voice"), Some(json!("alto")));
        assert_eq!(store.get_runtime("tts.voice"), None);
    }

    #[test]
    fn persistent_store_survives_new_instance() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("kvp");

        let store = KvpStore::new(&dir);
        assert_eq!(store.get_persistent("settings").unwrap(), None);
        store.set_persistent("settings", &json!({"theme": "dark"})).unwrap();
        store.set_persistent("settings", &json!({"theme": "light"})).unwrap();

        let reopened = KvpStore::new(&dir);
        assert_eq!(
            reopened.get_persistent("settings").unwrap(),
            Some(json!({"theme": "light"}))
        );
        let leftovers: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "tmp"))
            .collect();
        assert!(leftovers.is_empty());

        assert!(reopened.remove_persistent("settings").unwrap());
        assert!(!reopened.remove_persistent("settings").unwrap());
    }

    #[test]
    fn find_persistent_by_pattern() {
        let tmp = tempfile::tempdir().unwrap();
        let store = KvpStore::new(tmp.path());
        assert!(store.find_persistent("*").unwrap().is_empty());

        for key in ["branch.b", "branch.a", "other"] {
            store.set_persistent(key, &json!(true)).unwrap();
        }
        std::fs::write(tmp.path().join("notes.txt"), "x").unwrap();

        assert_eq!(store.find_persistent("branch.*").unwrap(), vec!["branch.a", "branch.b"]);
        assert_eq!(store.find_persistent("*").unwrap().len(), 3);
        assert!(store.find_persistent("[").is_err());
    }

    #[test]
    fn corrupt_entry_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("bad.json"), "{oops").unwrap();
        let store = KvpStore::new(tmp.path());
        assert!(matches!(
            store.get_persistent("bad"),
            Err(KvpError::Decode { .. })
        ));
    }
}
