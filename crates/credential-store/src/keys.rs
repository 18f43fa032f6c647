//! Storage key constants.

/// Logical keys under which session credentials are stored.
pub struct CredentialKeys;

impl CredentialKeys {
    /// Access token issued by the identity provider
    pub const AUTH_TOKEN: &'static str = "auth_token";

    /// Refresh token used to renew the access token
    pub const REFRESH_TOKEN: &'static str = "refresh_token";

    /// Cached user summary (JSON)
    pub const USER_DATA: &'static str = "user_data";

    /// Every key owned by a session, in deletion order.
    pub const SESSION_KEYS: [&'static str; 3] =
        [Self::AUTH_TOKEN, Self::REFRESH_TOKEN, Self::USER_DATA];
}
