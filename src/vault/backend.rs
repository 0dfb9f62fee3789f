//! Storage tier abstraction
//!
//! Every tier in the fallback chain implements [`StorageBackend`]. Values are
//! opaque strings at this level; envelopes and backups are layered on top by
//! the [`FallbackStore`](super::FallbackStore).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::VaultResult;

/// Position of a backend in the fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Durable per-installation directory
    Local,
    /// Scratch directory that does not outlive the process
    Session,
    /// SQLite key-value table
    Indexed,
    /// Process memory, last resort
    Memory,
}

impl Tier {
    /// All tiers in fallback order
    pub fn all() -> &'static [Tier] {
        &[Tier::Local, Tier::Session, Tier::Indexed, Tier::Memory]
    }

    /// Whether values in this tier survive a restart
    pub fn is_persistent(&self) -> bool {
        !matches!(self, Tier::Memory | Tier::Session)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Local => write!(f, "local"),
            Tier::Session => write!(f, "session"),
            Tier::Indexed => write!(f, "indexed"),
            Tier::Memory => write!(f, "memory"),
        }
    }
}

/// A single key-value storage mechanism
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Which tier this backend occupies
    fn tier(&self) -> Tier;

    /// Read a raw value
    async fn get(&self, key: &str) -> VaultResult<Option<String>>;

    /// Write a raw value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> VaultResult<()>;

    /// Remove a value, returning whether it existed
    async fn remove(&self, key: &str) -> VaultResult<bool>;

    /// List every stored key
    async fn keys(&self) -> VaultResult<Vec<String>>;
}
