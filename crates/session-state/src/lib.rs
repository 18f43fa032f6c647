//! Client-side authentication session state.
//!
//! [`SessionStateMachine`] is the single owner of the client's belief about
//! who is signed in. It runs commands (initialize, sign-in, sign-up,
//! sign-out) against an [`identity_gateway::IdentityGateway`], applies the
//! gateway's change notifications, and publishes every change through a
//! `tokio::sync::watch` channel.
//!
//! ## Status transitions
//!
//! ```text
//!   idle ──initialize──► loading ──identity──► success
//!    ▲                      │
//!    │                      └──none / failure──► error
//!    │
//!    └──sign_out (always)── loading ◄── any
//! ```
//!
//! `status` reports the outcome of the most recent command only. Whether a
//! user is signed in is `SessionState::is_authenticated`, derived from the
//! presence of a user.

mod error;
mod machine;
mod operation;
mod state;

#[cfg(test)]
mod tests;

pub use error::{CommandFamily, SessionError, SessionResult};
pub use machine::SessionStateMachine;
pub use state::{AuthStatus, Session, SessionState};
