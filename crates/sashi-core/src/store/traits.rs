//! Cache store trait and entry type.

use super::CacheNamespace;
use crate::error::Result;
use crate::http::{RequestIdentity, ResponseSnapshot};
use chrono::{DateTime, Utc};

/// A stored response with its write timestamp.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub snapshot: ResponseSnapshot,
    pub stored_at: DateTime<Utc>,
}

/// Namespace-isolated snapshot storage.
///
/// All mutation is whole-entry replace-or-create: a put either lands the
/// full snapshot or nothing, so concurrent writers to the same key resolve
/// with one winning and the store is never torn. Entries have no per-entry
/// expiry; they live until their namespace is deleted.
///
/// Operations are synchronous to match rusqlite's API, as the backends do
/// no long-running I/O per call.
pub trait CacheStore: Send + Sync {
    /// Store a snapshot, overwriting any entry with the same identity.
    fn put(
        &self,
        namespace: &CacheNamespace,
        identity: &RequestIdentity,
        snapshot: &ResponseSnapshot,
    ) -> Result<()>;

    /// Look up a snapshot. `None` on miss.
    fn get(
        &self,
        namespace: &CacheNamespace,
        identity: &RequestIdentity,
    ) -> Result<Option<CacheEntry>>;

    /// All namespace names with at least one entry, live or superseded.
    fn list_namespaces(&self) -> Result<Vec<String>>;

    /// Delete a namespace and every entry in it.
    fn delete_namespace(&self, name: &str) -> Result<()>;

    /// Number of entries in a namespace.
    fn entry_count(&self, namespace: &CacheNamespace) -> Result<usize>;
}
