//! Identity provider access for the Postboard client.
//!
//! This crate provides:
//! - The [`IdentityGateway`] trait: sign-up, sign-in, sign-out, current
//!   identity lookup, and change subscriptions
//! - An explicit observer interface with a release-once [`Subscription`] handle
//! - [`SupabaseGateway`], a GoTrue REST implementation that persists tokens
//!   through a [`credential_store::CredentialVault`] and refreshes them in the
//!   background

mod error;
mod gateway;
mod identity;
mod observer;
mod refresh;
mod supabase;

#[cfg(test)]
mod tests;

pub use error::{GatewayError, GatewayResult};
pub use gateway::IdentityGateway;
pub use identity::Identity;
pub use observer::{IdentityObserver, ObserverRegistry, Subscription};
pub use refresh::RefreshConfig;
pub use supabase::SupabaseGateway;
