//! The identity reported by the provider.

use credential_store::UserSummary;
use serde::{Deserialize, Serialize};

/// An authenticated user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque user identifier.
    pub id: String,
    /// Email address; empty when the provider has none.
    pub email: String,
}

impl Identity {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }
}

impl From<&UserSummary> for Identity {
    fn from(summary: &UserSummary) -> Self {
        Self::new(summary.user_id.clone(), summary.email.clone())
    }
}
