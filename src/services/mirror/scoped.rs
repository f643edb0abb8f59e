use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use crate::modules::session::model::StorageScope;
use crate::services::mirror::store::{FileStore, KvStore, MemoryStore, MirrorError};

// Persisted key contract, kept verbatim for compatibility with the portal
// front-end.
pub const APPOINTMENT_REQUESTED: &str = "appointmentRequested";
pub const APPOINTMENT_DETAILS: &str = "appointmentDetails";
pub const APPOINTMENT_STATUS: &str = "appointmentStatus";
pub const AUTH_TOKEN: &str = "authToken";
pub const REFRESH_TOKEN: &str = "refreshToken";
pub const CURRENT_USER: &str = "currentUser";

pub const CONTRACT_KEYS: [&str; 6] = [
    APPOINTMENT_REQUESTED,
    APPOINTMENT_DETAILS,
    APPOINTMENT_STATUS,
    AUTH_TOKEN,
    REFRESH_TOKEN,
    CURRENT_USER,
];

/// One storage abstraction over the two scopes. The active scope is resolved
/// once per login from the remember-me flag; every write lands in exactly one
/// scope and purges any stale copy from the other.
pub struct ScopedStore {
    session: Box<dyn KvStore>,
    persistent: Box<dyn KvStore>,
    active: RwLock<StorageScope>,
}

impl ScopedStore {
    pub fn new(session: Box<dyn KvStore>, persistent: Box<dyn KvStore>) -> Self {
        // A persisted credential means the last login asked to be remembered.
        let active = if persistent.get(AUTH_TOKEN).is_some() {
            StorageScope::Persistent
        } else {
            StorageScope::Session
        };
        Self {
            session,
            persistent,
            active: RwLock::new(active),
        }
    }

    /// Production wiring: in-memory session scope, file-backed persistent
    /// scope.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, MirrorError> {
        Ok(Self::new(
            Box::new(MemoryStore::new()),
            Box::new(FileStore::open(path)?),
        ))
    }

    /// Both scopes in memory; test wiring.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()), Box::new(MemoryStore::new()))
    }

    pub fn active_scope(&self) -> StorageScope {
        *self.active.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_active_scope(&self, scope: StorageScope) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = scope;
    }

    fn store(&self, scope: StorageScope) -> &dyn KvStore {
        match scope {
            StorageScope::Session => self.session.as_ref(),
            StorageScope::Persistent => self.persistent.as_ref(),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.store(self.active_scope()).get(key)
    }

    /// Read a specific scope directly; scenario assertions and scope
    /// migration need this.
    pub fn get_from(&self, scope: StorageScope, key: &str) -> Option<String> {
        self.store(scope).get(key)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), MirrorError> {
        let scope = self.active_scope();
        self.store(scope.other()).remove(key);
        self.store(scope).set(key, value)
    }

    /// Removes the key from both scopes so no stale copy survives.
    pub fn remove(&self, key: &str) {
        self.session.remove(key);
        self.persistent.remove(key);
    }

    /// Full teardown of the persisted contract, both scopes.
    pub fn clear_contract_keys(&self) {
        for key in CONTRACT_KEYS {
            self.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_purges_stale_copy_in_other_scope() {
        let store = ScopedStore::in_memory();

        store.set_active_scope(StorageScope::Persistent);
        store.set(AUTH_TOKEN, "remembered").unwrap();

        // New login without remember-me: same key, other scope.
        store.set_active_scope(StorageScope::Session);
        store.set(AUTH_TOKEN, "ephemeral").unwrap();

        assert_eq!(
            store.get_from(StorageScope::Session, AUTH_TOKEN),
            Some("ephemeral".to_string())
        );
        assert_eq!(store.get_from(StorageScope::Persistent, AUTH_TOKEN), None);
        assert_eq!(store.get(AUTH_TOKEN), Some("ephemeral".to_string()));
    }

    #[test]
    fn test_active_scope_detected_from_persisted_credentials() {
        let persistent = MemoryStore::new();
        persistent.set(AUTH_TOKEN, "remembered").unwrap();

        let store = ScopedStore::new(Box::new(MemoryStore::new()), Box::new(persistent));
        assert_eq!(store.active_scope(), StorageScope::Persistent);
        assert_eq!(store.get(AUTH_TOKEN), Some("remembered".to_string()));
    }

    #[test]
    fn test_clear_contract_keys_hits_both_scopes() {
        let store = ScopedStore::in_memory();
        store.set_active_scope(StorageScope::Persistent);
        store.set(AUTH_TOKEN, "a").unwrap();
        store.set_active_scope(StorageScope::Session);
        store.set(REFRESH_TOKEN, "r").unwrap();
        store.set(APPOINTMENT_STATUS, "pending").unwrap();

        store.clear_contract_keys();

        for scope in [StorageScope::Session, StorageScope::Persistent] {
            for key in CONTRACT_KEYS {
                assert_eq!(store.get_from(scope, key), None, "{key} left in {scope:?}");
            }
        }
    }
}
