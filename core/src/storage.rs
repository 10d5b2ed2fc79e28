//! Credential store boundary.
//!
//! # Design
//! The platform's secure key-value storage (keychain, keystore) is an
//! external collaborator; this module pins down its interface and the two
//! keys the client owns. Typed helpers keep the token-is-a-string /
//! profile-is-JSON encoding in one place, and a corrupt cached profile reads
//! as absent rather than failing bootstrap.

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;

use crate::types::Rider;

/// Key under which the session token is persisted.
pub const TOKEN_KEY: &str = "rider:token";

/// Key under which the cached rider profile is persisted (JSON-serialized).
pub const RIDER_KEY: &str = "rider:profile";

/// Error from a credential store backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Secure key-value storage for session credentials.
///
/// Implementations are expected to be cheap to call and safe to share; all
/// session-mutating writers are serialized by the session manager, so the
/// store itself needs no ordering guarantees beyond per-call atomicity.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// A shared store is a store. Lets a host keep a handle to the same storage
/// it hands the session manager.
impl<S: CredentialStore + ?Sized> CredentialStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        (**self).delete(key)
    }
}

/// Read the persisted session token.
pub fn stored_token<S: CredentialStore>(store: &S) -> Result<Option<String>, StorageError> {
    store.get(TOKEN_KEY)
}

/// Persist the session token.
pub fn persist_token<S: CredentialStore>(store: &S, token: &str) -> Result<(), StorageError> {
    store.set(TOKEN_KEY, token)
}

/// Read the cached rider profile. A missing or unparseable entry is `None`;
/// the cache is advisory and never worth failing over.
pub fn stored_rider<S: CredentialStore>(store: &S) -> Result<Option<Rider>, StorageError> {
    let Some(raw) = store.get(RIDER_KEY)? else {
        return Ok(None);
    };
    Ok(serde_json::from_str(&raw).ok())
}

/// Persist the rider profile cache.
pub fn persist_rider<S: CredentialStore>(store: &S, rider: &Rider) -> Result<(), StorageError> {
    let raw = serde_json::to_string(rider)
        .map_err(|e| StorageError::Backend(format!("profile encoding failed: {e}")))?;
    store.set(RIDER_KEY, &raw)
}

/// Remove both credential keys. Removing an absent key is not an error.
pub fn clear_credentials<S: CredentialStore>(store: &S) -> Result<(), StorageError> {
    store.delete(TOKEN_KEY)?;
    store.delete(RIDER_KEY)
}

/// In-memory credential store.
///
/// Backs tests and any host that keeps credentials for the process lifetime
/// only; production hosts supply a platform-backed implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let data = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("store lock poisoned".to_string()))?;
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut data = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("store lock poisoned".to_string()))?;
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut data = self
            .data
            .lock()
            .map_err(|_| StorageError::Backend("store lock poisoned".to_string()))?;
        data.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rider() -> Rider {
        Rider {
            id: 1,
            name: Some("Asha".to_string()),
            username: "rider_01".to_string(),
            phone: None,
            is_active: true,
        }
    }

    #[test]
    fn token_roundtrip() {
        let store = MemoryStore::new();
        assert!(stored_token(&store).unwrap().is_none());
        persist_token(&store, "abc").unwrap();
        assert_eq!(stored_token(&store).unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn rider_roundtrip() {
        let store = MemoryStore::new();
        persist_rider(&store, &rider()).unwrap();
        let back = stored_rider(&store).unwrap().unwrap();
        assert_eq!(back, rider());
    }

    #[test]
    fn corrupt_cached_rider_reads_as_absent() {
        let store = MemoryStore::new();
        store.set(RIDER_KEY, "not json").unwrap();
        assert!(stored_rider(&store).unwrap().is_none());
    }

    #[test]
    fn clear_removes_both_keys_and_is_idempotent() {
        let store = MemoryStore::new();
        persist_token(&store, "abc").unwrap();
        persist_rider(&store, &rider()).unwrap();
        clear_credentials(&store).unwrap();
        assert!(stored_token(&store).unwrap().is_none());
        assert!(stored_rider(&store).unwrap().is_none());
        clear_credentials(&store).unwrap();
    }
}
