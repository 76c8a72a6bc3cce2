// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persistence backends for the credential store.
//!
//! The store only sees the [`CredentialBackend`] trait; tests use the
//! in-memory backend and the server persists to a data directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::{keys, StoreError};
use crate::models::Credential;

/// Everything the store persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedCredentials {
    pub credentials: Vec<Credential>,
    pub current_id: Option<String>,
}

/// Storage medium for credentials.
pub trait CredentialBackend: Send + Sync {
    /// Load the persisted state (empty if nothing was saved yet).
    fn load(&self) -> Result<PersistedCredentials, StoreError>;

    /// Replace the persisted state.
    fn save(&self, state: &PersistedCredentials) -> Result<(), StoreError>;

    /// Remove everything.
    fn clear(&self) -> Result<(), StoreError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory backend
// ─────────────────────────────────────────────────────────────────────────────

/// Backend that keeps state in memory. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<PersistedCredentials>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with pre-existing state.
    pub fn with_state(state: PersistedCredentials) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Current persisted state.
    pub fn snapshot(&self) -> PersistedCredentials {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl CredentialBackend for MemoryBackend {
    fn load(&self) -> Result<PersistedCredentials, StoreError> {
        Ok(self.snapshot())
    }

    fn save(&self, state: &PersistedCredentials) -> Result<(), StoreError> {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = state.clone();
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = PersistedCredentials::default();
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File backend
// ─────────────────────────────────────────────────────────────────────────────

/// Backend that stores two files in a data directory: the credential
/// array and the current-credential pointer.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn credentials_path(&self) -> PathBuf {
        self.dir.join(keys::CREDENTIALS)
    }

    fn current_path(&self) -> PathBuf {
        self.dir.join(keys::CURRENT_ID)
    }

    /// Write via a temp file and rename so readers never see a partial file.
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::Io(e.to_string()))?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, contents).map_err(|e| StoreError::Io(e.to_string()))?;
        fs::rename(&tmp, path).map_err(|e| StoreError::Io(e.to_string()))
    }
}

/// Read a file, treating "not found" as absent.
fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::Io(e.to_string())),
    }
}

fn remove_optional(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::Io(e.to_string())),
    }
}

impl CredentialBackend for FileBackend {
    fn load(&self) -> Result<PersistedCredentials, StoreError> {
        let credentials = match read_optional(&self.credentials_path())? {
            Some(raw) => {
                serde_json::from_str(&raw).map_err(|e| StoreError::Parse(e.to_string()))?
            }
            None => Vec::new(),
        };

        let current_id = read_optional(&self.current_path())?
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(PersistedCredentials {
            credentials,
            current_id,
        })
    }

    fn save(&self, state: &PersistedCredentials) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&state.credentials)
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        self.write_atomic(&self.credentials_path(), &json)?;

        match &state.current_id {
            Some(id) => self.write_atomic(&self.current_path(), id.as_bytes()),
            None => remove_optional(&self.current_path()),
        }
    }

    fn clear(&self) -> Result<(), StoreError> {
        remove_optional(&self.credentials_path())?;
        remove_optional(&self.current_path())
    }
}
