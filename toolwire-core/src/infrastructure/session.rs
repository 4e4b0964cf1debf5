//! Session affinity
//!
//! The backend assigns an opaque session token on first contact and echoes
//! it in the `x-session-id` response header. The client never mints one; it
//! persists whatever the server last sent and attaches it to every request.

use crate::constants::SESSION_KEY;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Key/value persistence used by [`SessionStore`].
pub trait SessionBackend: Send + Sync {
    fn read(&self, key: &str) -> io::Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> io::Result<()>;
}

/// Stores each key as a file inside a directory.
#[derive(Debug, Clone)]
pub struct FileSessionBackend {
    dir: PathBuf,
}

impl FileSessionBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl SessionBackend for FileSessionBackend {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => {
                let trimmed = content.trim();
                Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(key), value)
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionBackend {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySessionBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionBackend for MemorySessionBackend {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Holds the current session token in memory, backed by persistent storage.
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    token: RwLock<Option<String>>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self {
            backend,
            token: RwLock::new(None),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionBackend::new()))
    }

    /// Reads the persisted token into memory. A read failure is logged and
    /// treated as "no session".
    pub fn load(&self) -> Option<String> {
        let loaded = match self.backend.read(SESSION_KEY) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "Failed to read persisted session token");
                None
            }
        };
        debug!(present = loaded.is_some(), "Loaded session token");
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = loaded.clone();
        loaded
    }

    pub fn current(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the held token. Returns `true` when the value changed.
    ///
    /// Blank tokens are ignored: the client never clears its session. A
    /// persistence failure is logged; the new token is still used for the
    /// rest of the process lifetime.
    pub fn set(&self, token: &str) -> bool {
        let token = token.trim();
        if token.is_empty() {
            return false;
        }
        {
            let mut held = self.token.write().unwrap_or_else(PoisonError::into_inner);
            if held.as_deref() == Some(token) {
                return false;
            }
            *held = Some(token.to_string());
        }
        info!("Session token updated by server");
        if let Err(err) = self.backend.write(SESSION_KEY, token) {
            warn!(error = %err, "Failed to persist session token");
        }
        true
    }

    /// Applies the session header of a response, if any.
    pub fn observe(&self, header: Option<&str>) -> bool {
        header.is_some_and(|value| self.set(value))
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("has_token", &self.current().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct BrokenBackend;

    impl SessionBackend for BrokenBackend {
        fn read(&self, _key: &str) -> io::Result<Option<String>> {
            Err(io::Error::other("disk unavailable"))
        }

        fn write(&self, _key: &str, _value: &str) -> io::Result<()> {
            Err(io::Error::other("disk unavailable"))
        }
    }

    #[test]
    fn starts_without_token() {
        let store = SessionStore::in_memory();
        assert_eq!(store.load(), None);
        assert_eq!(store.current(), None);
    }

    #[test]
    fn set_replaces_only_on_different_value() {
        let store = SessionStore::in_memory();
        assert!(store.set("abc"));
        assert!(!store.set("abc"));
        assert!(store.set("def"));
        assert_eq!(store.current().as_deref(), Some("def"));
    }

    #[test]
    fn blank_token_never_clears_session() {
        let store = SessionStore::in_memory();
        store.set("abc");
        assert!(!store.set("   "));
        assert!(!store.observe(None));
        assert_eq!(store.current().as_deref(), Some("abc"));
    }

    #[test]
    fn file_backend_survives_restart() {
        let dir = tempdir().expect("tempdir");
        let first = SessionStore::new(Arc::new(FileSessionBackend::new(dir.path())));
        first.set("persisted-token");

        let second = SessionStore::new(Arc::new(FileSessionBackend::new(dir.path())));
        assert_eq!(second.current(), None);
        assert_eq!(second.load().as_deref(), Some("persisted-token"));
        assert_eq!(second.current().as_deref(), Some("persisted-token"));
    }

    #[test]
    fn persistence_failures_are_not_fatal() {
        let store = SessionStore::new(Arc::new(BrokenBackend));
        assert_eq!(store.load(), None);
        assert!(store.set("in-memory-only"));
        assert_eq!(store.current().as_deref(), Some("in-memory-only"));
    }
}
