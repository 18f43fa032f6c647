//! Linux Secret Service backend.

use crate::{CredentialStore, StoreError, StoreResult};
use secret_service::blocking::{Collection, SecretService};
use secret_service::EncryptionType;
use std::collections::HashMap;
use tracing::debug;

/// Secret Service items in the default collection, tagged by service and key.
pub struct SecretServiceStore {
    service_name: String,
}

impl SecretServiceStore {
    /// Connect once up front so a missing D-Bus daemon fails early.
    pub fn new(service_name: &str) -> StoreResult<Self> {
        SecretService::connect(EncryptionType::Dh).map_err(|e| {
            StoreError::Platform(format!("Failed to connect to Secret Service: {}", e))
        })?;

        Ok(Self {
            service_name: service_name.to_string(),
        })
    }

    fn with_collection<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Collection) -> StoreResult<T>,
    {
        let ss = SecretService::connect(EncryptionType::Dh)
            .map_err(|e| StoreError::Platform(e.to_string()))?;
        let collection = ss
            .get_default_collection()
            .map_err(|e| StoreError::Platform(e.to_string()))?;

        if collection.is_locked().unwrap_or(false) {
            collection.unlock().map_err(|e| {
                StoreError::Platform(format!("Failed to unlock collection: {}", e))
            })?;
        }

        f(&collection)
    }

    fn attributes<'a>(&'a self, key: &'a str) -> HashMap<&'a str, &'a str> {
        HashMap::from([("service", self.service_name.as_str()), ("key", key)])
    }
}

impl CredentialStore for SecretServiceStore {
    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        debug!(service = %self.service_name, key = %key, "Setting secret");

        self.with_collection(|collection| {
            let label = format!("{}/{}", self.service_name, key);
            collection
                .create_item(&label, self.attributes(key), value.as_bytes(), true, "text/plain")
                .map_err(|e| StoreError::Platform(e.to_string()))?;
            Ok(())
        })
    }

    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.with_collection(|collection| {
            let items = collection
                .search_items(self.attributes(key))
                .map_err(|e| StoreError::Platform(e.to_string()))?;

            let Some(item) = items.first() else {
                return Ok(None);
            };

            let secret = item
                .get_secret()
                .map_err(|e| StoreError::Platform(e.to_string()))?;
            String::from_utf8(secret)
                .map(Some)
                .map_err(|e| StoreError::Encoding(e.to_string()))
        })
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        debug!(service = %self.service_name, key = %key, "Deleting secret");

        self.with_collection(|collection| {
            let items = collection
                .search_items(self.attributes(key))
                .map_err(|e| StoreError::Platform(e.to_string()))?;

            let mut removed = false;
            for item in &items {
                item.delete()
                    .map_err(|e| StoreError::Platform(e.to_string()))?;
                removed = true;
            }
            Ok(removed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires Linux Secret Service (D-Bus)
    fn test_secret_service_operations() {
        let store = SecretServiceStore::new("app.postboard.client.test").unwrap();
        store.remove("test_key");

        store.set("test_key", "one").unwrap();
        store.set("test_key", "two").unwrap();
        assert_eq!(store.get("test_key").unwrap(), Some("two".to_string()));

        assert!(store.delete("test_key").unwrap());
        assert!(!store.delete("test_key").unwrap());
        assert_eq!(store.get("test_key").unwrap(), None);
    }
}
