//! Directory-backed tiers
//!
//! One file per key under a root directory. Keys are hex-encoded into file
//! names so arbitrary keys never escape the root; the store caps key length
//! so every name, backups included, fits the 255-byte file name limit. Used for both the durable
//! `Local` tier and the process-scoped `Session` tier.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::backend::{StorageBackend, Tier};
use super::error::{VaultError, VaultResult};

const ENTRY_EXTENSION: &str = "json";

/// File-per-key storage backend
#[derive(Debug)]
pub struct DirBackend {
    root: PathBuf,
    tier: Tier,
    /// Largest value accepted, in bytes
    max_entry_bytes: Option<usize>,
}

impl DirBackend {
    /// Open (and create) a durable directory tier
    pub fn open(root: impl Into<PathBuf>, tier: Tier) -> VaultResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            tier,
            max_entry_bytes: None,
        })
    }

    /// Open a session tier: any leftovers from a previous process are wiped
    pub fn session(root: impl Into<PathBuf>) -> VaultResult<Self> {
        let root = root.into();
        if root.exists() {
            std::fs::remove_dir_all(&root)?;
        }
        Self::open(root, Tier::Session)
    }

    /// Builder: reject values above this size
    pub fn max_entry_bytes(mut self, limit: usize) -> Self {
        self.max_entry_bytes = Some(limit);
        self
    }

    /// Root directory of this tier
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> VaultResult<PathBuf> {
        if key.is_empty() {
            return Err(VaultError::InvalidKey(key.to_string()));
        }
        Ok(self
            .root
            .join(format!("{}.{}", encode_key(key), ENTRY_EXTENSION)))
    }
}

#[async_trait]
impl StorageBackend for DirBackend {
    fn tier(&self) -> Tier {
        self.tier
    }

    async fn get(&self, key: &str) -> VaultResult<Option<String>> {
        let path = self.entry_path(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> VaultResult<()> {
        if let Some(limit) = self.max_entry_bytes {
            if value.len() > limit {
                return Err(VaultError::QuotaExceeded {
                    tier: self.tier,
                    size: value.len(),
                    limit,
                });
            }
        }

        let path = self.entry_path(key)?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> VaultResult<bool> {
        let path = self.entry_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> VaultResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e != ENTRY_EXTENSION).unwrap_or(true) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match decode_key(stem) {
                Some(key) => keys.push(key),
                None => tracing::warn!(file = ?path, tier = %self.tier, "Skipping undecodable entry"),
            }
        }

        keys.sort();
        Ok(keys)
    }
}

fn encode_key(key: &str) -> String {
    hex::encode(key)
}

fn decode_key(stem: &str) -> Option<String> {
    hex::decode(stem).ok().and_then(|bytes| String::from_utf8(bytes).ok())
}
