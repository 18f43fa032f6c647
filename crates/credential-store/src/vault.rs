//! High-level API over the session credential keys.

use crate::{CredentialKeys, CredentialStore, StoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Cached summary of the signed-in user, stored next to the tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    /// User ID from the identity provider
    pub user_id: String,
    /// User email, empty when the provider has none
    #[serde(default)]
    pub email: String,
    /// When the access token expires (RFC 3339)
    pub expires_at: String,
    /// Project reference for namespacing
    pub project_ref: String,
}

impl UserSummary {
    /// Parsed expiry, or `None` if the stored timestamp is malformed.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.expires_at)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Owns the three session keys on top of a [`CredentialStore`].
pub struct CredentialVault {
    store: Box<dyn CredentialStore>,
}

impl CredentialVault {
    pub fn new(store: Box<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Persist a complete session.
    ///
    /// Write failures are returned: a session that cannot be persisted is
    /// not durable. On failure any partially written keys are removed.
    pub fn store_session(
        &self,
        access_token: &str,
        refresh_token: &str,
        summary: &UserSummary,
    ) -> StoreResult<()> {
        let encoded = serde_json::to_string(summary)?;

        let result = self
            .store
            .set(CredentialKeys::AUTH_TOKEN, access_token)
            .and_then(|_| self.store.set(CredentialKeys::REFRESH_TOKEN, refresh_token))
            .and_then(|_| self.store.set(CredentialKeys::USER_DATA, &encoded));

        if let Err(e) = result {
            warn!(user_id = %summary.user_id, error = %e, "Failed to persist session");
            self.clear_session();
            return Err(e);
        }

        debug!(user_id = %summary.user_id, "Session persisted");
        Ok(())
    }

    pub fn access_token(&self) -> StoreResult<Option<String>> {
        self.store.get(CredentialKeys::AUTH_TOKEN)
    }

    pub fn refresh_token(&self) -> StoreResult<Option<String>> {
        self.store.get(CredentialKeys::REFRESH_TOKEN)
    }

    /// Cached user summary. A summary that fails to decode is treated as absent.
    pub fn user_summary(&self) -> StoreResult<Option<UserSummary>> {
        match self.store.get(CredentialKeys::USER_DATA)? {
            Some(json) => match serde_json::from_str(&json) {
                Ok(summary) => Ok(Some(summary)),
                Err(e) => {
                    warn!(error = %e, "Discarding unreadable user summary");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// True when both tokens and the summary are present.
    pub fn has_session(&self) -> StoreResult<bool> {
        Ok(self.store.has(CredentialKeys::AUTH_TOKEN)?
            && self.store.has(CredentialKeys::REFRESH_TOKEN)?
            && self.user_summary()?.is_some())
    }

    /// True if the stored access token is expired (or its expiry is unknown).
    pub fn is_expired(&self) -> StoreResult<bool> {
        Ok(match self.user_summary()?.and_then(|s| s.expires_at()) {
            Some(expires_at) => expires_at <= Utc::now(),
            None => true,
        })
    }

    /// Remove every session key. Best-effort: never fails.
    pub fn clear_session(&self) {
        for key in CredentialKeys::SESSION_KEYS {
            self.store.remove(key);
        }
        debug!("Session credentials cleared");
    }
}
