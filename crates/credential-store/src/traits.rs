//! Storage trait definitions.

use crate::StoreResult;
use tracing::warn;

/// Durable per-device key/value store for opaque credentials.
///
/// Implementations must work before any network connectivity exists.
pub trait CredentialStore: Send + Sync {
    /// Store a value, replacing any existing value for the key.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Retrieve a value.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Delete a value. Returns whether anything was removed.
    fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Check if a key exists.
    fn has(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Best-effort delete. Failures are logged and swallowed.
    fn remove(&self, key: &str) {
        if let Err(e) = self.delete(key) {
            warn!(key = %key, error = %e, "Failed to remove credential");
        }
    }
}

impl<T: CredentialStore + ?Sized> CredentialStore for std::sync::Arc<T> {
    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        (**self).set(key, value)
    }

    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key)
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        (**self).delete(key)
    }

    fn remove(&self, key: &str) {
        (**self).remove(key)
    }
}
