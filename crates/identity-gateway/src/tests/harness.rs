//! Shared fixtures for gateway tests.

use super::fake_gotrue::FakeGoTrue;
use crate::{Identity, IdentityObserver, RefreshConfig, SupabaseGateway};
use chrono::Utc;
use credential_store::{CredentialKeys, CredentialStore, CredentialVault, MemoryStore, UserSummary};
use serde_json::json;
use std::sync::{Arc, Mutex};

pub const ANON_KEY: &str = "test-anon-key";

pub const PASSWORD_GRANT: &str = "/auth/v1/token?grant_type=password";
pub const REFRESH_GRANT: &str = "/auth/v1/token?grant_type=refresh_token";
pub const USER: &str = "/auth/v1/user";
pub const SIGNUP: &str = "/auth/v1/signup";
pub const LOGOUT: &str = "/auth/v1/logout";

/// Observer that records every delivered identity.
#[derive(Default)]
pub struct RecordingObserver {
    seen: Mutex<Vec<Option<Identity>>>,
}

impl RecordingObserver {
    pub fn seen(&self) -> Vec<Option<Identity>> {
        self.seen.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Option<Identity>> {
        self.seen.lock().unwrap().last().cloned()
    }
}

impl IdentityObserver for RecordingObserver {
    fn identity_changed(&self, identity: Option<&Identity>) {
        self.seen.lock().unwrap().push(identity.cloned());
    }
}

pub struct TestHarness {
    pub server: FakeGoTrue,
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<SupabaseGateway>,
}

impl TestHarness {
    pub async fn new() -> Self {
        let server = FakeGoTrue::start().await;
        let store = Arc::new(MemoryStore::new());
        let vault = CredentialVault::new(Box::new(store.clone()));
        let gateway = SupabaseGateway::with_refresh_config(
            vault,
            server.base_url(),
            ANON_KEY,
            RefreshConfig::immediate(3),
        )
        .unwrap();

        Self {
            server,
            store,
            gateway: Arc::new(gateway),
        }
    }

    /// Store a session whose access token expires in `expires_in_secs`.
    pub fn seed_session(&self, user_id: &str, email: &str, expires_in_secs: i64) {
        let vault = CredentialVault::new(Box::new(self.store.clone()));
        vault
            .store_session(
                "stored-access",
                "stored-refresh",
                &UserSummary {
                    user_id: user_id.to_string(),
                    email: email.to_string(),
                    expires_at: (Utc::now() + chrono::Duration::seconds(expires_in_secs))
                        .to_rfc3339(),
                    project_ref: "127".to_string(),
                },
            )
            .unwrap();
    }

    pub fn stored(&self, key: &str) -> Option<String> {
        self.store.get(key).unwrap()
    }

    pub fn has_tokens(&self) -> bool {
        self.stored(CredentialKeys::AUTH_TOKEN).is_some()
            || self.stored(CredentialKeys::REFRESH_TOKEN).is_some()
    }

    pub fn observe(&self) -> (Arc<RecordingObserver>, crate::Subscription) {
        use crate::IdentityGateway;

        let observer = Arc::new(RecordingObserver::default());
        let subscription = self.gateway.subscribe(observer.clone());
        (observer, subscription)
    }
}

pub fn token_body(access: &str, refresh: &str, user_id: &str, email: &str) -> serde_json::Value {
    json!({
        "access_token": access,
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": refresh,
        "user": { "id": user_id, "email": email, "aud": "authenticated" }
    })
}

pub fn user_body(user_id: &str, email: &str) -> serde_json::Value {
    json!({ "id": user_id, "email": email, "aud": "authenticated" })
}
