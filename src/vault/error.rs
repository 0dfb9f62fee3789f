//! Vault error types
//!
//! Errors raised by individual storage tiers. The fallback store itself
//! treats most of these as soft failures and moves on to the next tier.

use thiserror::Error;

use super::backend::Tier;

/// Errors that can occur in a storage tier
#[derive(Error, Debug)]
pub enum VaultError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite backend failure
    #[error("Database error: {0}")]
    Database(String),

    /// Entry larger than the tier accepts
    #[error("Quota exceeded on {tier} tier: {size} bytes (limit {limit})")]
    QuotaExceeded { tier: Tier, size: usize, limit: usize },

    /// The tier could not be opened or has been disabled
    #[error("{0} tier unavailable")]
    Unavailable(Tier),

    /// Key is empty or otherwise unusable
    #[error("Invalid key: {0:?}")]
    InvalidKey(String),

    /// Backup checksum mismatch or unreadable backup
    #[error("Corrupt backup {key}: {reason}")]
    CorruptBackup { key: String, reason: String },

    /// No live value to back up
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        VaultError::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for VaultError {
    fn from(err: rusqlite::Error) -> Self {
        VaultError::Database(err.to_string())
    }
}

/// Result type alias for vault operations
pub type VaultResult<T> = Result<T, VaultError>;
