//! In-memory cache store.

use super::traits::{CacheEntry, CacheStore};
use super::CacheNamespace;
use crate::error::{Result, SashiError};
use crate::http::{RequestIdentity, ResponseSnapshot};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

/// Cache store backed by a process-local map.
///
/// Used by tests and by platforms without a writable data directory. Same
/// atomicity contract as the SQLite store: whole-entry replace under one
/// lock.
#[derive(Default)]
pub struct MemoryStore {
    namespaces: RwLock<HashMap<String, HashMap<RequestIdentity, CacheEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_err() -> SashiError {
        SashiError::CacheUnavailable {
            message: "cache lock poisoned".to_string(),
            source: None,
        }
    }
}

impl CacheStore for MemoryStore {
    fn put(
        &self,
        namespace: &CacheNamespace,
        identity: &RequestIdentity,
        snapshot: &ResponseSnapshot,
    ) -> Result<()> {
        let mut namespaces = self.namespaces.write().map_err(|_| Self::lock_err())?;
        namespaces.entry(namespace.name()).or_default().insert(
            identity.clone(),
            CacheEntry {
                snapshot: snapshot.clone(),
                stored_at: Utc::now(),
            },
        );
        Ok(())
    }

    fn get(
        &self,
        namespace: &CacheNamespace,
        identity: &RequestIdentity,
    ) -> Result<Option<CacheEntry>> {
        let namespaces = self.namespaces.read().map_err(|_| Self::lock_err())?;
        Ok(namespaces
            .get(&namespace.name())
            .and_then(|entries| entries.get(identity))
            .cloned())
    }

    fn list_namespaces(&self) -> Result<Vec<String>> {
        let namespaces = self.namespaces.read().map_err(|_| Self::lock_err())?;
        Ok(namespaces.keys().cloned().collect())
    }

    fn delete_namespace(&self, name: &str) -> Result<()> {
        let mut namespaces = self.namespaces.write().map_err(|_| Self::lock_err())?;
        namespaces.remove(name);
        Ok(())
    }

    fn entry_count(&self, namespace: &CacheNamespace) -> Result<usize> {
        let namespaces = self.namespaces.read().map_err(|_| Self::lock_err())?;
        Ok(namespaces
            .get(&namespace.name())
            .map(|entries| entries.len())
            .unwrap_or(0))
    }
}
