//! Durable request/response cache.
//!
//! Stores map a request identity to a captured response snapshot, isolated
//! by versioned namespace. Two backends share one trait: an in-memory store
//! for tests and constrained platforms, and a SQLite store for durability.

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{CacheEntry, CacheStore};

use serde::{Deserialize, Serialize};

/// Logical role of a cache namespace. Exactly two roles exist; at most one
/// namespace per role is current at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceRole {
    Static,
    Dynamic,
}

impl NamespaceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NamespaceRole::Static => "static",
            NamespaceRole::Dynamic => "dynamic",
        }
    }
}

/// A versioned, named cache container.
///
/// Eviction compares typed generation numbers instead of matching name
/// prefixes, so a superseded generation can never be confused with a live
/// one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheNamespace {
    pub role: NamespaceRole,
    pub generation: u32,
}

impl CacheNamespace {
    pub fn new(role: NamespaceRole, generation: u32) -> Self {
        Self { role, generation }
    }

    /// Stable rendered name used as the storage key, e.g. `sashi-static-v3`.
    pub fn name(&self) -> String {
        format!("sashi-{}-v{}", self.role.as_str(), self.generation)
    }

    /// Parse a rendered name back into a typed namespace.
    pub fn parse(name: &str) -> Option<Self> {
        let rest = name.strip_prefix("sashi-")?;
        let (role_str, gen_str) = rest.rsplit_once("-v")?;
        let role = match role_str {
            "static" => NamespaceRole::Static,
            "dynamic" => NamespaceRole::Dynamic,
            _ => return None,
        };
        let generation = gen_str.parse().ok()?;
        Some(Self { role, generation })
    }
}

impl std::fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The pair of namespaces currently serving traffic.
///
/// Owned by the lifecycle controller; the strategy engine and the fallback
/// generator hold shared read handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveNamespaces {
    pub static_ns: CacheNamespace,
    pub dynamic_ns: CacheNamespace,
}

impl ActiveNamespaces {
    pub fn for_generation(generation: u32) -> Self {
        Self {
            static_ns: CacheNamespace::new(NamespaceRole::Static, generation),
            dynamic_ns: CacheNamespace::new(NamespaceRole::Dynamic, generation),
        }
    }

    /// Whether a stored namespace name belongs to this live pair.
    pub fn is_current(&self, name: &str) -> bool {
        name == self.static_ns.name() || name == self.dynamic_ns.name()
    }
}
