//! macOS Keychain backend.

use crate::{CredentialStore, StoreError, StoreResult};
use security_framework::passwords::{
    delete_generic_password, get_generic_password, set_generic_password,
};
use tracing::debug;

/// `errSecItemNotFound`
const ERR_SEC_ITEM_NOT_FOUND: i32 = -25300;

/// Generic-password Keychain items, one per key, under a shared service name.
pub struct KeychainStore {
    service_name: String,
}

impl KeychainStore {
    pub fn new(service_name: &str) -> StoreResult<Self> {
        Ok(Self {
            service_name: service_name.to_string(),
        })
    }
}

impl CredentialStore for KeychainStore {
    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        debug!(service = %self.service_name, key = %key, "Setting keychain item");

        set_generic_password(&self.service_name, key, value.as_bytes())
            .map_err(|e| StoreError::Platform(format!("Failed to set keychain item: {}", e)))
    }

    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match get_generic_password(&self.service_name, key) {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| StoreError::Encoding(e.to_string())),
            Err(e) if e.code() == ERR_SEC_ITEM_NOT_FOUND => Ok(None),
            Err(e) => Err(StoreError::Platform(format!(
                "Failed to get keychain item: {}",
                e
            ))),
        }
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        debug!(service = %self.service_name, key = %key, "Deleting keychain item");

        match delete_generic_password(&self.service_name, key) {
            Ok(()) => Ok(true),
            Err(e) if e.code() == ERR_SEC_ITEM_NOT_FOUND => Ok(false),
            Err(e) => Err(StoreError::Platform(format!(
                "Failed to delete keychain item: {}",
                e
            ))),
        }
    }
}
