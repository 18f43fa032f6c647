//! Secure credential storage for the Postboard client.
//!
//! This crate provides the platform-specific backends:
//! - **macOS**: Keychain Access via `security-framework`
//! - **Linux**: Secret Service (GNOME Keyring / KWallet) via `secret-service`
//!
//! plus a JSON file backend for hosts without a keychain, an in-memory
//! backend, and [`CredentialVault`], which owns the session keys.

mod file;
mod keys;
mod memory;
mod traits;
mod vault;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "linux")]
mod linux;

pub use file::FileStore;
pub use keys::CredentialKeys;
pub use memory::MemoryStore;
pub use traits::CredentialStore;
pub use vault::{CredentialVault, UserSummary};

use thiserror::Error;

/// Service name used for all keychain entries.
pub const SERVICE_NAME: &str = "app.postboard.client";

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Platform-specific storage error
    #[error("Platform storage error: {0}")]
    Platform(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Create the default platform keychain store.
pub fn create_store() -> StoreResult<Box<dyn CredentialStore>> {
    #[cfg(target_os = "macos")]
    {
        let store = macos::KeychainStore::new(SERVICE_NAME)?;
        Ok(Box::new(store))
    }

    #[cfg(target_os = "linux")]
    {
        let store = linux::SecretServiceStore::new(SERVICE_NAME)?;
        Ok(Box::new(store))
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        Err(StoreError::Platform(
            "No keychain implementation available for this platform".to_string(),
        ))
    }
}
