//! Table Routes
//!
//! CRUD over the hosted record tables.
//!
//! - GET /api/v1/tables - Row counts per table
//! - GET /api/v1/tables/:table - List rows (`q`, `sort`, `dir`, `limit`, `offset`, filters)
//! - POST /api/v1/tables/:table - Create a row
//! - GET /api/v1/tables/:table/:id - Get a row
//! - PUT /api/v1/tables/:table/:id - Merge a patch into a row
//! - DELETE /api/v1/tables/:table/:id - Delete a row

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::dto::{DeleteResponse, RecordListResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::domain::TableKind;
use crate::listing::{self, ListQuery};
use crate::tables::{merge_patch, TableCount};

/// Resolve a table name from the path
pub(crate) fn table_kind(name: &str) -> ApiResult<TableKind> {
    TableKind::from_name(name).ok_or_else(|| ApiError::NotFound(format!("Unknown table: {}", name)))
}

/// GET /api/v1/tables
pub async fn table_counts(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<TableCount>>> {
    Ok(Json(state.tables.counts()?))
}

/// GET /api/v1/tables/:table
pub async fn list_records(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(mut params): Query<HashMap<String, String>>,
) -> ApiResult<Json<RecordListResponse>> {
    let kind = table_kind(&table)?;
    // WebSocket-style auth parameter, not a filter
    params.remove("token");
    let query = ListQuery::from_params(&params).map_err(ApiError::BadRequest)?;

    let rows = state.tables.list(kind.name())?;
    let listing = listing::apply(rows, &query);

    Ok(Json(RecordListResponse {
        table: kind.name().to_string(),
        total: listing.total,
        rows: listing.rows,
    }))
}

/// POST /api/v1/tables/:table
///
/// Validates the row against the table's entity before storing it.
pub async fn create_record(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Json(row): Json<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let kind = table_kind(&table)?;
    kind.validate_row(&row)?;

    let stored = state.tables.insert(kind.name(), row)?;
    tracing::info!(table = %kind, id = ?stored.get("id"), "Record created");

    Ok((StatusCode::CREATED, Json(stored)))
}

/// GET /api/v1/tables/:table/:id
pub async fn get_record(
    State(state): State<Arc<AppState>>,
    Path((table, id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let kind = table_kind(&table)?;
    state
        .tables
        .get(kind.name(), &id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Record {} not found in {}", id, kind)))
}

/// PUT /api/v1/tables/:table/:id
///
/// The merged row must still validate.
pub async fn update_record(
    State(state): State<Arc<AppState>>,
    Path((table, id)): Path<(String, String)>,
    Json(patch): Json<Value>,
) -> ApiResult<Json<Value>> {
    let kind = table_kind(&table)?;
    if !patch.is_object() {
        return Err(ApiError::BadRequest("patch must be a JSON object".to_string()));
    }

    let current = state
        .tables
        .get(kind.name(), &id)?
        .ok_or_else(|| ApiError::NotFound(format!("Record {} not found in {}", id, kind)))?;
    kind.validate_row(&merge_patch(&current, &patch))?;

    let updated = state.tables.update(kind.name(), &id, patch)?;
    tracing::info!(table = %kind, id = %id, "Record updated");
    Ok(Json(updated))
}

/// DELETE /api/v1/tables/:table/:id
pub async fn delete_record(
    State(state): State<Arc<AppState>>,
    Path((table, id)): Path<(String, String)>,
) -> ApiResult<Json<DeleteResponse>> {
    let kind = table_kind(&table)?;
    if !state.tables.delete(kind.name(), &id)? {
        return Err(ApiError::NotFound(format!("Record {} not found in {}", id, kind)));
    }
    tracing::info!(table = %kind, id = %id, "Record deleted");
    Ok(Json(DeleteResponse { deleted: true }))
}
