//! The identity gateway contract.

use crate::{GatewayResult, Identity, IdentityObserver, Subscription};
use async_trait::async_trait;
use std::sync::Arc;

/// Remote authority for authentication.
///
/// Every operation may fail with a message-bearing [`crate::GatewayError`].
/// Notifications delivered through [`IdentityGateway::subscribe`] may arrive
/// at any time: synchronously inside `subscribe` (replay of the current
/// identity), after sign-in/sign-out, and after a background token refresh.
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Register a new account.
    async fn sign_up(&self, email: &str, password: &str) -> GatewayResult<()>;

    /// Authenticate with email and password.
    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<()>;

    /// End the current session.
    async fn sign_out(&self) -> GatewayResult<()>;

    /// The identity of the currently valid session, if any.
    async fn fetch_current_identity(&self) -> GatewayResult<Option<Identity>>;

    /// Register for change notifications until the handle is released.
    fn subscribe(&self, observer: Arc<dyn IdentityObserver>) -> Subscription;
}
