//! The session read model.

use identity_gateway::Identity;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// The signed-in user as seen by the rest of the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub email: String,
}

impl From<&Identity> for Session {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            email: identity.email.clone(),
        }
    }
}

impl From<Identity> for Session {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            email: identity.email,
        }
    }
}

/// Outcome of the most recent session command.
///
/// This is not the authentication fact: a failed sign-in leaves `Error` even
/// though a later notification may sign the user in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuthStatus::Idle => "idle",
            AuthStatus::Loading => "loading",
            AuthStatus::Success => "success",
            AuthStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Snapshot of the session as published to consumers.
///
/// Only [`crate::SessionStateMachine`] mutates it. `is_authenticated` is
/// derived from `user` and cannot drift from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    user: Option<Session>,
    status: AuthStatus,
    error: Option<String>,
}

impl SessionState {
    pub fn user(&self) -> Option<&Session> {
        self.user.as_ref()
    }

    pub fn status(&self) -> AuthStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// A command started.
    pub(crate) fn begin(&mut self, clear_error: bool) {
        self.status = AuthStatus::Loading;
        if clear_error {
            self.error = None;
        }
    }

    /// A command resolved with an identity.
    pub(crate) fn succeed(&mut self, user: Session) {
        self.user = Some(user);
        self.status = AuthStatus::Success;
        self.error = None;
    }

    /// A command resolved without an identity.
    pub(crate) fn fail(&mut self, message: String) {
        self.user = None;
        self.status = AuthStatus::Error;
        self.error = Some(message);
    }

    pub(crate) fn sign_out(&mut self) {
        self.user = None;
        self.status = AuthStatus::Idle;
        self.error = None;
    }

    /// Notification from the gateway. Status is left alone.
    pub(crate) fn set_user(&mut self, user: Option<Session>) {
        self.user = user;
    }

    pub(crate) fn clear_error(&mut self) {
        self.error = None;
    }
}

impl Serialize for SessionState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SessionState", 4)?;
        state.serialize_field("user", &self.user)?;
        state.serialize_field("isAuthenticated", &self.is_authenticated())?;
        state.serialize_field("status", &self.status)?;
        state.serialize_field("error", &self.error)?;
        state.end()
    }
}
