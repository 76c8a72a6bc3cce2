// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local persistence: credential store backends and the activity cache.

pub mod activity_cache;
pub mod backend;
pub mod credentials;

pub use activity_cache::ActivityCache;
pub use backend::{CredentialBackend, FileBackend, MemoryBackend, PersistedCredentials};
pub use credentials::CredentialStore;

/// File names used by the file backend.
pub mod keys {
    /// JSON array of credential records
    pub const CREDENTIALS: &str = "credentials.json";
    /// ID of the current credential
    pub const CURRENT_ID: &str = "current_credential_id";
}

/// Credential storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to access credential storage: {0}")]
    Io(String),

    #[error("Failed to parse stored credentials: {0}")]
    Parse(String),

    #[error("Unknown credential: {0}")]
    UnknownCredential(String),
}
