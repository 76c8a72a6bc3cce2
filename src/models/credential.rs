// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Stored account credentials.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Number of access token characters shown in listings.
const TOKEN_PREVIEW_LEN: usize = 20;

/// One connected account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Internal ID (athlete ID when known)
    pub id: String,
    /// Strava athlete ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub athlete_id: Option<String>,
    /// Display name
    pub name: String,
    /// Short-lived access token
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Access token expiry (Unix seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl Credential {
    /// Merge an incoming record into this one. Incoming values win;
    /// optional fields the incoming record lacks are kept.
    pub fn merge(&mut self, incoming: Credential) {
        self.name = incoming.name;
        self.access_token = incoming.access_token;
        self.athlete_id = incoming.athlete_id.or(self.athlete_id.take());
        self.refresh_token = incoming.refresh_token.or(self.refresh_token.take());
        self.expires_at = incoming.expires_at.or(self.expires_at);
    }

    /// Apply a refreshed token triple.
    pub fn apply(&mut self, patch: TokenPatch) {
        self.access_token = patch.access_token;
        if patch.refresh_token.is_some() {
            self.refresh_token = patch.refresh_token;
        }
        if patch.expires_at.is_some() {
            self.expires_at = patch.expires_at;
        }
    }
}

/// Credential resolved for one request: just what API calls need.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveCredential {
    pub id: String,
    pub access_token: String,
}

impl From<Credential> for ActiveCredential {
    fn from(credential: Credential) -> Self {
        Self {
            id: credential.id,
            access_token: credential.access_token,
        }
    }
}

/// New token values after a refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPatch {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
}

/// Credential as shown to the client: the access token is truncated and
/// the refresh token is never exposed.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CredentialView {
    pub id: String,
    pub athlete_id: Option<String>,
    pub name: String,
    pub token_preview: String,
    pub expires_at: Option<i64>,
    pub is_current: bool,
}

impl CredentialView {
    pub fn new(credential: &Credential, is_current: bool) -> Self {
        let preview: String = credential
            .access_token
            .chars()
            .take(TOKEN_PREVIEW_LEN)
            .collect();

        Self {
            id: credential.id.clone(),
            athlete_id: credential.athlete_id.clone(),
            name: credential.name.clone(),
            token_preview: format!("{}...", preview),
            expires_at: credential.expires_at,
            is_current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> Credential {
        Credential {
            id: "123".to_string(),
            athlete_id: Some("123".to_string()),
            name: "Alex".to_string(),
            access_token: "old_access".to_string(),
            refresh_token: Some("old_refresh".to_string()),
            expires_at: Some(1_700_000_000),
        }
    }

    #[test]
    fn test_merge_keeps_missing_optionals() {
        let mut existing = credential();
        existing.merge(Credential {
            id: "123".to_string(),
            athlete_id: None,
            name: "Alex R".to_string(),
            access_token: "manual".to_string(),
            refresh_token: None,
            expires_at: None,
        });

        assert_eq!(existing.name, "Alex R");
        assert_eq!(existing.access_token, "manual");
        assert_eq!(existing.refresh_token.as_deref(), Some("old_refresh"));
        assert_eq!(existing.expires_at, Some(1_700_000_000));
        assert_eq!(existing.athlete_id.as_deref(), Some("123"));
    }

    #[test]
    fn test_apply_patch() {
        let mut c = credential();
        c.apply(TokenPatch {
            access_token: "new_access".to_string(),
            refresh_token: Some("new_refresh".to_string()),
            expires_at: Some(1_700_021_600),
        });
        assert_eq!(c.access_token, "new_access");
        assert_eq!(c.refresh_token.as_deref(), Some("new_refresh"));
        assert_eq!(c.expires_at, Some(1_700_021_600));
    }

    #[test]
    fn test_view_masks_tokens() {
        let mut c = credential();
        c.access_token = "a".repeat(40);
        let view = CredentialView::new(&c, true);
        assert_eq!(view.token_preview, format!("{}...", "a".repeat(20)));
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("old_refresh"));
    }
}
