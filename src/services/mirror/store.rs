use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("storage quota exhausted: {0}")]
    Quota(String),
    #[error("storage io failure: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt mirror file: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Flat string key-value store, the shape of web storage. Implementations
/// must tolerate concurrent callers; writes are last-writer-wins per key.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), MirrorError>;
    fn remove(&self, key: &str);
}

/// Session-scope store: lives only as long as the process, like a browser
/// tab's sessionStorage.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), MirrorError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// Persistent-scope store: a JSON object on disk, rewritten atomically on
/// every change. Survives reloads the way localStorage does.
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, MirrorError> {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    fn flush(&self, entries: &HashMap<String, String>) -> Result<(), MirrorError> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        // Write-then-rename so a crash never leaves a torn mirror file.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, bytes).map_err(classify_write)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn classify_write(e: io::Error) -> MirrorError {
    // ENOSPC
    if e.raw_os_error() == Some(28) {
        MirrorError::Quota(e.to_string())
    } else {
        MirrorError::Io(e)
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), MirrorError> {
        let snapshot = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            entries.insert(key.to_string(), value.to_string());
            entries.clone()
        };
        // The in-memory copy stays authoritative even when the flush fails;
        // the caller decides whether that is fatal.
        self.flush(&snapshot)
    }

    fn remove(&self, key: &str) {
        let snapshot = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            if entries.remove(key).is_none() {
                return;
            }
            entries.clone()
        };
        if let Err(e) = self.flush(&snapshot) {
            tracing::warn!(key, error = %e, "mirror flush after remove failed");
        }
    }
}
