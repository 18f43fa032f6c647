//! GoTrue (Supabase Auth) implementation of the identity gateway.

use crate::{
    GatewayError, GatewayResult, Identity, IdentityGateway, IdentityObserver, ObserverRegistry,
    RefreshConfig, Subscription,
};
use async_trait::async_trait;
use chrono::Utc;
use credential_store::{CredentialVault, UserSummary};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Per-request timeout for GoTrue calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How long the auto-refresh task waits when there is nothing to refresh,
/// or after a transient refresh failure.
const IDLE_POLL: Duration = Duration::from_secs(30);

/// Minimum pause after a successful automatic refresh.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Token grant response (password and refresh_token grants).
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: UserResponse,
}

/// Sign-up response. Carries a session only when the project auto-confirms
/// new accounts; otherwise it is the bare user object.
#[derive(Debug, Default, Deserialize)]
struct SignUpResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    user: Option<UserResponse>,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl From<UserResponse> for Identity {
    fn from(user: UserResponse) -> Self {
        Identity::new(user.id, user.email.unwrap_or_default())
    }
}

/// Error body shapes returned by GoTrue.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Human-readable message for a failed GoTrue response.
fn error_message(status: StatusCode, body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    [
        parsed.error_description,
        parsed.msg,
        parsed.message,
        parsed.error,
    ]
    .into_iter()
    .flatten()
    .map(|m| m.trim().to_string())
    .find(|m| !m.is_empty())
    .unwrap_or_else(|| {
        let body = body.trim();
        if body.is_empty() || body.starts_with('{') {
            format!("HTTP {}", status.as_u16())
        } else {
            body.to_string()
        }
    })
}

async fn read_failure(response: Response) -> (StatusCode, String) {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    (status, error_message(status, &body))
}

/// Project reference used to namespace stored sessions
/// (`abc123` for `https://abc123.supabase.co`).
pub(crate) fn project_ref_from_url(supabase_url: &url::Url) -> String {
    supabase_url
        .host_str()
        .and_then(|host| host.split('.').next())
        .filter(|label| !label.is_empty())
        .unwrap_or("default")
        .to_string()
}

/// Identity gateway backed by the GoTrue REST API.
///
/// Tokens and the cached user summary live in a [`CredentialVault`]; the
/// gateway is the only writer of those keys.
pub struct SupabaseGateway {
    vault: CredentialVault,
    supabase_url: String,
    anon_key: String,
    project_ref: String,
    http_client: Client,
    refresh_config: RefreshConfig,
    observers: ObserverRegistry,
    /// Serializes refresh-token grants; GoTrue rotates the refresh token on use.
    refresh_lock: tokio::sync::Mutex<()>,
    /// Bumped whenever the session ends. Guards credential writes and
    /// notifications so a grant that started before a sign-out is discarded.
    session_epoch: Mutex<u64>,
}

impl SupabaseGateway {
    pub fn new(vault: CredentialVault, supabase_url: &str, anon_key: &str) -> GatewayResult<Self> {
        Self::with_refresh_config(vault, supabase_url, anon_key, RefreshConfig::default())
    }

    pub fn with_refresh_config(
        vault: CredentialVault,
        supabase_url: &str,
        anon_key: &str,
        refresh_config: RefreshConfig,
    ) -> GatewayResult<Self> {
        if anon_key.trim().is_empty() {
            return Err(GatewayError::Config("Supabase anon key is empty".to_string()));
        }

        let parsed = url::Url::parse(supabase_url)?;
        let http_client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            vault,
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            project_ref: project_ref_from_url(&parsed),
            http_client,
            refresh_config,
            observers: ObserverRegistry::new(),
            refresh_lock: tokio::sync::Mutex::new(()),
            session_epoch: Mutex::new(0),
        })
    }

    /// Project reference recorded with stored sessions.
    pub fn project_ref(&self) -> &str {
        &self.project_ref
    }

    /// Identity from the cached summary, without contacting the server.
    ///
    /// `None` when no complete, unexpired session is stored.
    pub fn cached_identity(&self) -> GatewayResult<Option<Identity>> {
        if !self.vault.has_session()? || self.vault.is_expired()? {
            return Ok(None);
        }
        Ok(self.vault.user_summary()?.as_ref().map(Identity::from))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.supabase_url, path)
    }

    fn lock_epoch(&self) -> MutexGuard<'_, u64> {
        self.session_epoch
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn current_epoch(&self) -> u64 {
        *self.lock_epoch()
    }

    /// Persist a token grant for `identity` and notify subscribers.
    ///
    /// With `since = Some(epoch)` the grant is dropped with
    /// [`GatewayError::SessionEnded`] if the session ended after `epoch` was
    /// read.
    fn commit_session(
        &self,
        since: Option<u64>,
        access_token: &str,
        refresh_token: &str,
        expires_in: i64,
        identity: &Identity,
    ) -> GatewayResult<()> {
        let summary = UserSummary {
            user_id: identity.id.clone(),
            email: identity.email.clone(),
            expires_at: (Utc::now() + chrono::Duration::seconds(expires_in)).to_rfc3339(),
            project_ref: self.project_ref.clone(),
        };

        let epoch = self.lock_epoch();
        if since.is_some_and(|since| since != *epoch) {
            debug!(user_id = %identity.id, "Discarding grant for an ended session");
            return Err(GatewayError::SessionEnded);
        }
        self.vault
            .store_session(access_token, refresh_token, &summary)?;
        self.observers.notify(Some(identity));
        Ok(())
    }

    /// Drop stored credentials and tell subscribers nobody is signed in.
    fn end_session(&self) {
        let mut epoch = self.lock_epoch();
        *epoch = epoch.wrapping_add(1);
        self.vault.clear_session();
        self.observers.notify(None);
    }

    /// Exchange the stored refresh token for a new session and notify
    /// subscribers with the refreshed identity.
    ///
    /// Transient failures are retried with exponential backoff. Credentials
    /// are left untouched on failure; callers decide whether to clear them.
    /// A session that ends while the grant is in flight stays ended and the
    /// call fails with [`GatewayError::SessionEnded`].
    pub async fn refresh_session(&self) -> GatewayResult<Identity> {
        let _guard = self.refresh_lock.lock().await;
        let epoch = self.current_epoch();

        let refresh_token = self
            .vault
            .refresh_token()?
            .ok_or_else(|| GatewayError::TokenRefresh("No refresh token available".to_string()))?;

        let grant = self.refresh_with_backoff(&refresh_token).await?;
        let identity = Identity::from(grant.user);
        self.commit_session(
            Some(epoch),
            &grant.access_token,
            &grant.refresh_token,
            grant.expires_in,
            &identity,
        )?;

        info!(user_id = %identity.id, "Token refreshed");
        Ok(identity)
    }

    async fn refresh_with_backoff(&self, refresh_token: &str) -> GatewayResult<TokenResponse> {
        let max_retries = self.refresh_config.max_retries.max(1);
        let mut attempt = 0;

        loop {
            match self.try_refresh(refresh_token).await {
                Ok(grant) => return Ok(grant),
                Err(e) if e.is_transient() && attempt + 1 < max_retries => {
                    warn!(
                        attempt = attempt + 1,
                        max_retries,
                        error = %e,
                        "Token refresh failed with transient error"
                    );
                    let delay = self.refresh_config.delay_for_attempt(attempt);
                    debug!(delay_ms = delay.as_millis() as u64, "Retrying token refresh");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    warn!(max_retries, error = %e, "Token refresh failed after all attempts");
                    return Err(e);
                }
                Err(e) => {
                    warn!(error = %e, "Token refresh rejected");
                    return Err(e);
                }
            }
        }
    }

    async fn try_refresh(&self, refresh_token: &str) -> GatewayResult<TokenResponse> {
        let url = self.endpoint("/auth/v1/token?grant_type=refresh_token");
        debug!(url = %url, "Refreshing token");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(GatewayError::from_request)?;

        if !response.status().is_success() {
            let (status, message) = read_failure(response).await;
            if status.is_server_error() {
                return Err(GatewayError::Server {
                    status: status.as_u16(),
                    message,
                });
            }
            return Err(GatewayError::TokenRefresh(message));
        }

        Ok(response.json().await?)
    }

    /// Ask the server who the access token belongs to.
    async fn verify_with_server(&self, access_token: &str) -> GatewayResult<Identity> {
        let url = self.endpoint("/auth/v1/user");
        debug!(url = %url, "Verifying session with server");

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(GatewayError::from_request)?;

        if !response.status().is_success() {
            let (status, message) = read_failure(response).await;
            if status.is_server_error() {
                return Err(GatewayError::Server {
                    status: status.as_u16(),
                    message,
                });
            }
            return Err(GatewayError::SessionInvalid(message));
        }

        let user: UserResponse = response.json().await?;
        Ok(Identity::from(user))
    }

    /// Spawn a task that refreshes the access token `margin` before it expires.
    ///
    /// The task holds only a weak reference and exits once the gateway is
    /// dropped. Abort the returned handle to stop it earlier.
    pub fn spawn_auto_refresh(self: &Arc<Self>, margin: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move { auto_refresh_loop(weak, margin).await })
    }

    /// Time until the stored session is due for refresh, or `None` when
    /// there is no session to refresh.
    fn refresh_due_in(&self, margin: Duration) -> GatewayResult<Option<Duration>> {
        if !self.vault.has_session()? {
            return Ok(None);
        }
        let expires_at = match self.vault.user_summary()?.and_then(|s| s.expires_at()) {
            Some(expires_at) => expires_at,
            None => return Ok(Some(Duration::ZERO)),
        };
        let margin = chrono::Duration::from_std(margin).unwrap_or_else(|_| chrono::Duration::zero());
        let due_at = expires_at - margin;
        Ok(Some((due_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)))
    }

    /// Time left on the stored access token.
    fn remaining_lifetime(&self) -> GatewayResult<Option<Duration>> {
        Ok(self
            .vault
            .user_summary()?
            .and_then(|s| s.expires_at())
            .map(|expires_at| (expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)))
    }
}

/// Refresh margin for a token that lives `lifetime`: never more than half of it.
fn clamp_margin(requested: Duration, lifetime: Duration) -> Duration {
    requested.min(lifetime / 2)
}

async fn auto_refresh_loop(gateway: Weak<SupabaseGateway>, requested_margin: Duration) {
    debug!(margin_secs = requested_margin.as_secs(), "Auto refresh started");
    let mut margin = requested_margin;

    loop {
        let wait = {
            let Some(strong) = gateway.upgrade() else {
                break;
            };
            match strong.refresh_due_in(margin) {
                Ok(Some(wait)) => wait,
                Ok(None) => IDLE_POLL,
                Err(e) => {
                    warn!(error = %e, "Could not read stored session");
                    IDLE_POLL
                }
            }
        };

        if !wait.is_zero() {
            tokio::time::sleep(wait.min(IDLE_POLL)).await;
            continue;
        }

        let Some(strong) = gateway.upgrade() else {
            break;
        };
        let result = strong.refresh_session().await;
        match result {
            Ok(identity) => {
                margin = match strong.remaining_lifetime() {
                    Ok(Some(lifetime)) => clamp_margin(requested_margin, lifetime),
                    _ => requested_margin,
                };
                debug!(
                    user_id = %identity.id,
                    margin_secs = margin.as_secs(),
                    "Auto refresh succeeded"
                );
                drop(strong);
                tokio::time::sleep(MIN_REFRESH_INTERVAL).await;
            }
            Err(GatewayError::SessionEnded) => debug!("Session ended during auto refresh"),
            Err(e) if e.is_transient() => {
                warn!(error = %e, "Auto refresh failed, will retry");
                drop(strong);
                tokio::time::sleep(IDLE_POLL).await;
            }
            Err(e) => {
                warn!(error = %e, "Auto refresh rejected, ending session");
                strong.end_session();
            }
        }
    }

    debug!("Auto refresh stopped");
}

#[async_trait]
impl IdentityGateway for SupabaseGateway {
    async fn sign_up(&self, email: &str, password: &str) -> GatewayResult<()> {
        let url = self.endpoint("/auth/v1/signup");
        debug!(url = %url, "Registering account");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&PasswordRequest { email, password })
            .send()
            .await
            .map_err(GatewayError::from_request)?;

        if !response.status().is_success() {
            let (status, message) = read_failure(response).await;
            warn!(status = %status, "Sign up failed");
            if status.is_server_error() {
                return Err(GatewayError::Server {
                    status: status.as_u16(),
                    message,
                });
            }
            return Err(GatewayError::SignUpRejected(message));
        }

        let data: SignUpResponse = response.json().await?;
        match (data.access_token, data.refresh_token, data.user) {
            (Some(access_token), Some(refresh_token), Some(user)) => {
                let identity = Identity::from(user);
                self.commit_session(
                    None,
                    &access_token,
                    &refresh_token,
                    data.expires_in.unwrap_or(3600),
                    &identity,
                )?;
                info!(user_id = %identity.id, "Signed up");
            }
            (_, _, user) => {
                let user_id = user.map(|u| u.id).or(data.id).unwrap_or_default();
                info!(user_id = %user_id, "Signed up, awaiting email confirmation");
            }
        }
        Ok(())
    }

    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<()> {
        let url = self.endpoint("/auth/v1/token?grant_type=password");
        debug!(url = %url, "Attempting email/password sign in");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&PasswordRequest { email, password })
            .send()
            .await
            .map_err(GatewayError::from_request)?;

        if !response.status().is_success() {
            let (status, message) = read_failure(response).await;
            warn!(status = %status, "Sign in failed");
            if status.is_server_error() {
                return Err(GatewayError::Server {
                    status: status.as_u16(),
                    message,
                });
            }
            return Err(GatewayError::InvalidCredentials(message));
        }

        let data: TokenResponse = response.json().await?;
        let identity = Identity::from(data.user);
        self.commit_session(
            None,
            &data.access_token,
            &data.refresh_token,
            data.expires_in,
            &identity,
        )?;

        info!(user_id = %identity.id, "Signed in");
        Ok(())
    }

    async fn sign_out(&self) -> GatewayResult<()> {
        let access_token = match self.vault.access_token() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Could not read access token for sign out");
                None
            }
        };

        let result = match access_token {
            Some(token) => self.revoke(&token).await,
            None => Ok(()),
        };

        self.end_session();
        info!("Signed out");
        result
    }

    async fn fetch_current_identity(&self) -> GatewayResult<Option<Identity>> {
        let Some(access_token) = self.vault.access_token()? else {
            debug!("No stored session");
            return Ok(None);
        };

        let summary = self.vault.user_summary()?;
        if summary.is_none() || self.vault.refresh_token()?.is_none() {
            info!("Stored session is incomplete, clearing it");
            self.end_session();
            return Ok(None);
        }

        if self.vault.is_expired()? {
            info!("Stored session expired, refreshing");
            return match self.refresh_session().await {
                Ok(identity) => Ok(Some(identity)),
                Err(GatewayError::SessionEnded) => Ok(None),
                Err(e) if e.is_transient() => Err(e),
                Err(e) => {
                    warn!(error = %e, "Session could not be refreshed, clearing it");
                    self.end_session();
                    Ok(None)
                }
            };
        }

        let epoch = self.current_epoch();
        match self.verify_with_server(&access_token).await {
            Ok(_) if self.current_epoch() != epoch => {
                debug!("Session ended during verification");
                Ok(None)
            }
            Ok(identity) => {
                debug!(user_id = %identity.id, "Session verified with server");
                Ok(Some(identity))
            }
            Err(GatewayError::SessionInvalid(message)) => {
                warn!(reason = %message, "Server rejected stored session, clearing it");
                self.end_session();
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn subscribe(&self, observer: Arc<dyn IdentityObserver>) -> Subscription {
        let subscription = self.observers.register(observer.clone());

        match self.cached_identity() {
            Ok(identity) => observer.identity_changed(identity.as_ref()),
            Err(e) => warn!(error = %e, "Could not replay cached identity"),
        }

        subscription
    }
}

impl SupabaseGateway {
    /// Revoke the access token server-side.
    ///
    /// A token the server already considers invalid counts as revoked.
    async fn revoke(&self, access_token: &str) -> GatewayResult<()> {
        let url = self.endpoint("/auth/v1/logout");
        debug!(url = %url, "Revoking session");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(GatewayError::from_request)?;

        let status = response.status();
        if status.is_success()
            || matches!(
                status,
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
            )
        {
            return Ok(());
        }

        let (status, message) = read_failure(response).await;
        warn!(status = %status, "Session revocation failed");
        Err(GatewayError::Server {
            status: status.as_u16(),
            message,
        })
    }
}
