//! Gateway error types.

use thiserror::Error;

/// Identity gateway error type.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Invalid email or password
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Registration refused (duplicate account, weak password, ...)
    #[error("Sign up rejected: {0}")]
    SignUpRejected(String),

    /// Session was invalidated server-side (revoked, signed out elsewhere, etc.)
    #[error("Session invalid: {0}")]
    SessionInvalid(String),

    /// Token refresh error
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    /// The session was ended while a token grant was in flight
    #[error("Session ended before the token refresh completed")]
    SessionEnded,

    /// Unexpected non-success response
    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// Credential storage error
    #[error("Storage error: {0}")]
    Storage(#[from] credential_store::StoreError),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Network unavailable (transient error, can retry)
    #[error("Network unavailable")]
    NetworkUnavailable,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Classify a failed HTTP exchange.
    pub(crate) fn from_request(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            GatewayError::Timeout
        } else if error.is_connect() {
            GatewayError::NetworkUnavailable
        } else {
            GatewayError::Http(error)
        }
    }

    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// Transient errors include:
    /// - Network unavailable and timeouts
    /// - Connection failures
    /// - 5xx responses
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::NetworkUnavailable | GatewayError::Timeout => true,
            GatewayError::Server { status, .. } => *status >= 500,
            GatewayError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                e.status().is_some_and(|status| status.is_server_error())
            }
            _ => false,
        }
    }
}

/// Result type alias using GatewayError.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transient_network_unavailable() {
        assert!(GatewayError::NetworkUnavailable.is_transient());
        assert!(GatewayError::Timeout.is_transient());
    }

    #[test]
    fn test_server_errors_by_status() {
        let unavailable = GatewayError::Server {
            status: 503,
            message: "upstream down".to_string(),
        };
        let teapot = GatewayError::Server {
            status: 418,
            message: "no".to_string(),
        };
        assert!(unavailable.is_transient());
        assert!(!teapot.is_transient());
    }

    #[test]
    fn test_is_not_transient_auth_failures() {
        assert!(!GatewayError::InvalidCredentials("bad password".to_string()).is_transient());
        assert!(!GatewayError::SignUpRejected("exists".to_string()).is_transient());
        assert!(!GatewayError::SessionInvalid("revoked".to_string()).is_transient());
        assert!(!GatewayError::SessionEnded.is_transient());
    }

    #[test]
    fn test_messages_carry_provider_text() {
        let err = GatewayError::InvalidCredentials("Invalid login credentials".to_string());
        assert_eq!(err.to_string(), "Invalid credentials: Invalid login credentials");
    }
}
