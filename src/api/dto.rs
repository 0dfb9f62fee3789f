//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::vault::{BackupEntry, Tier, VaultStats};

// ============================================
// TABLE DTOs
// ============================================

/// Paged table listing
#[derive(Debug, Serialize)]
pub struct RecordListResponse {
    pub table: String,
    /// Matching rows before paging
    pub total: usize,
    pub rows: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

// ============================================
// VAULT DTOs
// ============================================

#[derive(Debug, Serialize)]
pub struct VaultValueResponse {
    pub key: String,
    pub value: Value,
}

/// Result of a vault write
#[derive(Debug, Serialize)]
pub struct VaultSaveResponse {
    pub key: String,
    pub stamp: u64,
    pub written: Vec<Tier>,
    /// True when only the in-memory tier holds the value
    pub degraded: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<TierFailure>,
}

#[derive(Debug, Serialize)]
pub struct TierFailure {
    pub tier: Tier,
    pub error: String,
}

/// Backup listing entry; the payload itself is omitted
#[derive(Debug, Serialize)]
pub struct BackupSummary {
    pub stamp: u64,
    pub checksum: u32,
}

impl From<&BackupEntry> for BackupSummary {
    fn from(entry: &BackupEntry) -> Self {
        Self {
            stamp: entry.stamp,
            checksum: entry.checksum,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BackupListResponse {
    pub key: String,
    pub backups: Vec<BackupSummary>,
}

#[derive(Debug, Serialize)]
pub struct RestoreResponse {
    pub key: String,
    pub restored_stamp: u64,
}

#[derive(Debug, Serialize)]
pub struct BackupRunResponse {
    pub backed_up: usize,
}

// ============================================
// BUCKET DTOs
// ============================================

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub path: String,
    pub size: usize,
}

// ============================================
// REPORT / IMPORT DTOs
// ============================================

#[derive(Debug, Default, Deserialize)]
pub struct ReportParams {
    /// pdf (default), csv or text
    pub format: Option<String>,
    /// Restrict the transactions report to one statement
    pub statement_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImportParams {
    /// Validate only, store nothing
    #[serde(default)]
    pub dry_run: bool,
    /// Single-character delimiter, `,` by default
    pub delimiter: Option<char>,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded" or "unhealthy"
    pub status: String,
    /// Vault status: "ok" or "memory_only"
    pub vault: String,
    /// Table database status: "ok" or "error"
    pub tables: String,
    pub uptime_seconds: u64,
    pub websocket_connections: usize,
    pub version: String,
    pub storage: VaultStats,
}
