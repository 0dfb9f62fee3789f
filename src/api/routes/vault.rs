//! Vault Routes
//!
//! Key/value access to the multi-tier store.
//!
//! - GET /api/v1/vault - Live keys and per-tier statistics
//! - POST /api/v1/vault/backup - Back up every critical key now
//! - GET /api/v1/vault/:key - Read the freshest value
//! - PUT /api/v1/vault/:key - Save a value
//! - DELETE /api/v1/vault/:key - Remove a value and its backups
//! - GET /api/v1/vault/:key/backups - List backups, newest first
//! - POST /api/v1/vault/:key/restore - Restore the newest valid backup

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::api::dto::{
    BackupListResponse, BackupRunResponse, BackupSummary, DeleteResponse, RestoreResponse,
    TierFailure, VaultSaveResponse, VaultValueResponse,
};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::vault::VaultStats;

#[derive(Debug, Serialize)]
pub struct VaultOverview {
    pub keys: Vec<String>,
    pub stats: VaultStats,
}

/// GET /api/v1/vault
pub async fn overview(State(state): State<Arc<AppState>>) -> Json<VaultOverview> {
    Json(VaultOverview {
        keys: state.vault.keys().await,
        stats: state.vault.stats().await,
    })
}

/// GET /api/v1/vault/:key
pub async fn get_value(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> ApiResult<Json<VaultValueResponse>> {
    let value: Value = state
        .vault
        .get(&key)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("No value stored under '{}'", key)))?;
    Ok(Json(VaultValueResponse { key, value }))
}

/// PUT /api/v1/vault/:key
///
/// Succeeds even when only memory accepted the write; `degraded` says so.
pub async fn put_value(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(value): Json<Value>,
) -> ApiResult<Json<VaultSaveResponse>> {
    let outcome = state.vault.save(&key, &value).await?;

    Ok(Json(VaultSaveResponse {
        degraded: outcome.is_degraded(),
        key: outcome.key,
        stamp: outcome.stamp,
        written: outcome.written,
        failed: outcome
            .failed
            .into_iter()
            .map(|(tier, error)| TierFailure { tier, error })
            .collect(),
    }))
}

/// DELETE /api/v1/vault/:key
pub async fn delete_value(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let deleted = state.vault.remove(&key).await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// GET /api/v1/vault/:key/backups
pub async fn list_backups(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Json<BackupListResponse> {
    let backups = state.vault.backups(&key).await;
    Json(BackupListResponse {
        backups: backups.iter().map(BackupSummary::from).collect(),
        key,
    })
}

/// POST /api/v1/vault/:key/restore
pub async fn restore(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> ApiResult<Json<RestoreResponse>> {
    let entry = state.vault.restore(&key).await?;
    Ok(Json(RestoreResponse {
        key,
        restored_stamp: entry.stamp,
    }))
}

/// POST /api/v1/vault/backup
pub async fn backup_now(State(state): State<Arc<AppState>>) -> Json<BackupRunResponse> {
    let backed_up = state.vault.backup_all_critical().await;
    tracing::info!(backed_up, "Manual critical-key backup");
    Json(BackupRunResponse { backed_up })
}
