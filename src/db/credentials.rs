// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential store: the list of connected accounts and the current one.
//!
//! Every mutation is written through to the backend while the write lock is
//! held, so persisted state always matches memory. Subscribers are notified
//! after each change (used by the token refresh scheduler).

use tokio::sync::{watch, RwLock};

use super::{CredentialBackend, MemoryBackend, PersistedCredentials, StoreError};
use crate::models::{Credential, TokenPatch};

/// Multi-account credential store over a pluggable backend.
pub struct CredentialStore {
    backend: Box<dyn CredentialBackend>,
    state: RwLock<PersistedCredentials>,
    changes: watch::Sender<u64>,
}

impl CredentialStore {
    /// Open a store, loading whatever the backend has persisted.
    ///
    /// Unreadable stored state is logged and replaced with an empty store.
    pub fn open<B: CredentialBackend + 'static>(backend: B) -> Self {
        let mut state = backend.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load stored credentials, starting empty");
            PersistedCredentials::default()
        });

        // A dangling pointer means no current credential.
        if let Some(id) = &state.current_id {
            if !state.credentials.iter().any(|c| &c.id == id) {
                state.current_id = None;
            }
        }

        tracing::info!(
            count = state.credentials.len(),
            current = ?state.current_id,
            "Credential store opened"
        );

        let (changes, _) = watch::channel(0);
        Self {
            backend: Box::new(backend),
            state: RwLock::new(state),
            changes,
        }
    }

    /// Store backed by memory only.
    pub fn in_memory() -> Self {
        Self::open(MemoryBackend::new())
    }

    /// Receive a notification after every change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn notify(&self) {
        self.changes.send_modify(|generation| *generation += 1);
    }

    /// Re-read state from the backend, discarding in-memory state.
    pub async fn load(&self) -> Result<(), StoreError> {
        let loaded = self.backend.load()?;
        *self.state.write().await = loaded;
        self.notify();
        Ok(())
    }

    /// Write the current in-memory state to the backend.
    pub async fn save(&self) -> Result<(), StoreError> {
        let state = self.state.read().await;
        self.backend.save(&state)
    }

    pub async fn list(&self) -> Vec<Credential> {
        self.state.read().await.credentials.clone()
    }

    pub async fn current_id(&self) -> Option<String> {
        self.state.read().await.current_id.clone()
    }

    pub async fn current(&self) -> Option<Credential> {
        let state = self.state.read().await;
        let id = state.current_id.as_ref()?;
        state.credentials.iter().find(|c| &c.id == id).cloned()
    }

    pub async fn get(&self, id: &str) -> Option<Credential> {
        self.state
            .read()
            .await
            .credentials
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    /// Make `id` the current credential.
    pub async fn select_current(&self, id: &str) -> Result<Credential, StoreError> {
        let mut state = self.state.write().await;
        let credential = state
            .credentials
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownCredential(id.to_string()))?;

        state.current_id = Some(credential.id.clone());
        self.backend.save(&state)?;
        drop(state);

        self.notify();
        Ok(credential)
    }

    /// Insert or merge a credential and make it current.
    pub async fn upsert(&self, credential: Credential) -> Result<Credential, StoreError> {
        let mut state = self.state.write().await;

        let position = state
            .credentials
            .iter()
            .position(|c| c.id == credential.id);
        let stored = match position {
            Some(pos) => {
                state.credentials[pos].merge(credential);
                state.credentials[pos].clone()
            }
            None => {
                state.credentials.push(credential.clone());
                credential
            }
        };

        state.current_id = Some(stored.id.clone());
        self.backend.save(&state)?;
        drop(state);

        tracing::info!(id = %stored.id, name = %stored.name, "Credential stored");
        self.notify();
        Ok(stored)
    }

    /// Apply refreshed token values. Returns `None` if `id` is unknown.
    ///
    /// Concurrent refreshes of the same credential are not serialized; the
    /// last write wins.
    pub async fn update_token(
        &self,
        id: &str,
        patch: TokenPatch,
    ) -> Result<Option<Credential>, StoreError> {
        let mut state = self.state.write().await;
        let Some(existing) = state.credentials.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };

        existing.apply(patch);
        let updated = existing.clone();
        self.backend.save(&state)?;
        drop(state);

        self.notify();
        Ok(Some(updated))
    }

    /// Remove a credential. Returns whether it existed.
    pub async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let before = state.credentials.len();
        state.credentials.retain(|c| c.id != id);
        let removed = state.credentials.len() != before;

        if state.current_id.as_deref() == Some(id) {
            state.current_id = None;
        }
        self.backend.save(&state)?;
        drop(state);

        if removed {
            tracing::info!(id, "Credential removed");
        }
        self.notify();
        Ok(removed)
    }

    /// Remove every credential and the current pointer.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        *state = PersistedCredentials::default();
        self.backend.clear()?;
        drop(state);

        tracing::info!("All credentials cleared");
        self.notify();
        Ok(())
    }
}
