// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access token lifecycle on top of the credential store.
//!
//! Refresh is idempotent and not serialized: two concurrent refreshes of
//! the same credential both write, and the last write wins.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::cancel::CancelToken;
use crate::db::CredentialStore;
use crate::error::AppError;
use crate::models::{Credential, TokenPatch};
use crate::services::strava::{StravaAthlete, StravaClient, TokenExchangeResponse};

/// Shortest wait before a scheduled refresh.
const MIN_REFRESH_DELAY: Duration = Duration::from_secs(1);

/// Wait after a failed scheduled refresh before trying again.
const REFRESH_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Token retrieval, refresh, and OAuth exchange.
pub struct SessionService {
    store: Arc<CredentialStore>,
    client: StravaClient,
    refresh_margin: Duration,
}

/// Whether the credential's access token has expired at `now` (Unix
/// seconds). A credential without an expiry is treated as expired.
pub fn is_token_expired(credential: &Credential, now: i64) -> bool {
    match credential.expires_at {
        Some(expires_at) => now >= expires_at,
        None => true,
    }
}

/// How long to wait before refreshing a token expiring at `expires_at`:
/// `margin` ahead of expiry, but never sooner than one second.
pub fn refresh_delay(expires_at: Option<i64>, now: i64, margin: Duration) -> Option<Duration> {
    let expires_at = expires_at?;
    let margin = i64::try_from(margin.as_secs()).unwrap_or(i64::MAX);
    let secs = expires_at.saturating_sub(margin).saturating_sub(now);
    let delay = Duration::from_secs(u64::try_from(secs).unwrap_or(0));
    Some(delay.max(MIN_REFRESH_DELAY))
}

/// Display name for a newly connected athlete.
pub fn athlete_display_name(athlete: Option<&StravaAthlete>) -> String {
    athlete
        .and_then(|a| {
            a.firstname
                .as_deref()
                .or(a.username.as_deref())
                .filter(|name| !name.is_empty())
        })
        .unwrap_or("Athlete")
        .to_string()
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

impl SessionService {
    pub fn new(store: Arc<CredentialStore>, client: StravaClient, refresh_margin: Duration) -> Self {
        Self {
            store,
            client,
            refresh_margin,
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Resolve a credential (by ID, else the current one) with a usable
    /// access token, refreshing first when it has expired.
    ///
    /// If the refresh fails the existing token is returned unchanged and
    /// Strava gets to decide whether it still works.
    pub async fn access_token_for(&self, id: Option<&str>) -> Result<Credential, AppError> {
        let credential = match id {
            Some(id) => self
                .store
                .get(id)
                .await
                .ok_or_else(|| AppError::NotFound(format!("Credential {} not found", id)))?,
            None => self.store.current().await.ok_or(AppError::NoCredential)?,
        };

        if !is_token_expired(&credential, now_secs()) || credential.refresh_token.is_none() {
            return Ok(credential);
        }

        tracing::info!(id = %credential.id, "Access token expired, refreshing");
        match self.refresh(&credential.id).await {
            Ok(true) => Ok(self.store.get(&credential.id).await.unwrap_or(credential)),
            Ok(false) => Ok(credential),
            Err(e) => {
                tracing::warn!(id = %credential.id, error = %e, "Token refresh failed, using existing token");
                Ok(credential)
            }
        }
    }

    /// Refresh a stored credential's token.
    ///
    /// Returns `false` when the credential is unknown or has no refresh
    /// token.
    pub async fn refresh(&self, id: &str) -> Result<bool, AppError> {
        let Some(credential) = self.store.get(id).await else {
            return Ok(false);
        };
        let Some(refresh_token) = credential.refresh_token.as_deref() else {
            return Ok(false);
        };

        let refreshed = self.client.refresh_token(refresh_token).await?;
        let patch = TokenPatch {
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token,
            expires_at: refreshed.expires_at,
        };

        let updated = self.store.update_token(id, patch).await?;
        if updated.is_some() {
            tracing::info!(id, "Token refreshed");
        }
        Ok(updated.is_some())
    }

    /// Exchange an OAuth code and store the resulting credential as current.
    pub async fn exchange_code(
        &self,
        code: &str,
    ) -> Result<(Credential, TokenExchangeResponse), AppError> {
        let response = self.client.exchange_code(code).await?;

        let athlete_id = response.athlete.as_ref().map(|a| a.id.to_string());
        let credential = Credential {
            id: athlete_id
                .clone()
                .unwrap_or_else(|| format!("athlete-{}", chrono::Utc::now().timestamp_millis())),
            athlete_id,
            name: athlete_display_name(response.athlete.as_ref()),
            access_token: response.access_token.clone(),
            refresh_token: response.refresh_token.clone(),
            expires_at: response.expires_at,
        };

        let stored = self.store.upsert(credential).await?;
        tracing::info!(id = %stored.id, name = %stored.name, "OAuth code exchanged");
        Ok((stored, response))
    }

    /// Keep the current credential's token fresh until `cancel` fires.
    ///
    /// The timer re-arms whenever the store changes (a new current
    /// credential, or the token the scheduler itself just refreshed).
    pub fn spawn_refresh_scheduler(self: Arc<Self>, cancel: CancelToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut changes = self.store.subscribe();
            let mut retry_after: Option<Duration> = None;

            loop {
                let _ = changes.borrow_and_update();

                let current = self.store.current().await;
                let scheduled = current.as_ref().and_then(|c| {
                    c.refresh_token.as_ref()?;
                    let delay = refresh_delay(c.expires_at, now_secs(), self.refresh_margin)?;
                    Some((c.id.clone(), retry_after.take().unwrap_or(delay)))
                });
                let armed = scheduled.is_some();
                let wait = scheduled
                    .as_ref()
                    .map(|(_, delay)| *delay)
                    .unwrap_or_default();

                if let Some((id, delay)) = &scheduled {
                    tracing::debug!(id = %id, delay_secs = delay.as_secs(), "Token refresh scheduled");
                }

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(wait), if armed => {
                        if let Some((id, _)) = scheduled {
                            if let Err(e) = self.refresh(&id).await {
                                tracing::warn!(id = %id, error = %e, "Scheduled token refresh failed");
                                retry_after = Some(REFRESH_RETRY_DELAY);
                            }
                        }
                    }
                }
            }

            tracing::debug!("Token refresh scheduler stopped");
        })
    }
}
