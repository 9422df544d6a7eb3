//! Session persistence backends.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;

use super::SessionState;

// =============================================================================
// Error Types
// =============================================================================

/// Errors persisting session state.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to access session file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed session file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

// =============================================================================
// SessionStore
// =============================================================================

/// Where session state is loaded from and saved to.
pub trait SessionStore: Send + Sync {
    /// Load the persisted state. A missing backing file yields the default
    /// state, not an error.
    fn load(&self) -> Result<SessionState>;

    /// Persist the state.
    fn save(&self, state: &SessionState) -> Result<()>;
}

// =============================================================================
// FsSessionStore
// =============================================================================

/// JSON-file-backed session store.
pub struct FsSessionStore {
    path: PathBuf,
}

impl FsSessionStore {
    /// Create a store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionStore for FsSessionStore {
    fn load(&self) -> Result<SessionState> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SessionState::default())
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, state: &SessionState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

// =============================================================================
// MemorySessionStore
// =============================================================================

/// In-memory session store for tests.
#[derive(Default)]
pub struct MemorySessionStore {
    state: Mutex<SessionState>,
}

impl MemorySessionStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<SessionState> {
        Ok(self.state.lock().map(|s| s.clone()).unwrap_or_default())
    }

    fn save(&self, state: &SessionState) -> Result<()> {
        if let Ok(mut guard) = self.state.lock() {
            *guard = state.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_store_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSessionStore::new(dir.path().join("session.json"));
        assert_eq!(store.load().unwrap(), SessionState::default());
    }

    #[test]
    fn test_fs_store_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSessionStore::new(dir.path().join("nested/session.json"));

        let mut state = SessionState::default();
        state.add_repository("octo/widgets");
        store.save(&state).unwrap();

        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn test_fs_store_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FsSessionStore::new(path);
        assert!(matches!(store.load(), Err(SessionError::Json(_))));
    }

    #[test]
    fn test_memory_store() {
        let store = MemorySessionStore::new();
        let mut state = SessionState::default();
        state.add_repository("octo/widgets");
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), state);
    }
}
