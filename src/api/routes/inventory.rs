//! Inventory Routes
//!
//! - GET /api/v1/inventory/barcode/:code - Item by decoded barcode or SKU
//! - GET /api/v1/inventory/summary - Stock totals

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::domain::inventory::{self, InventoryItem, StockSummary};
use crate::domain::{decode_row, TableKind};

/// Inventory rows paired with their decoded items; undecodable rows are skipped
pub(crate) fn load_items(state: &AppState) -> ApiResult<Vec<(Value, InventoryItem)>> {
    let rows = state.tables.list(TableKind::Inventory.name())?;
    Ok(rows
        .into_iter()
        .filter_map(|row| match decode_row::<InventoryItem>(&row) {
            Ok(item) => Some((row, item)),
            Err(e) => {
                tracing::warn!(id = ?row.get("id"), error = %e, "Skipping malformed inventory row");
                None
            }
        })
        .collect())
}

/// GET /api/v1/inventory/barcode/:code
pub async fn lookup_barcode(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> ApiResult<Json<Value>> {
    let pairs = load_items(&state)?;
    let items: Vec<InventoryItem> = pairs.iter().map(|(_, item)| item.clone()).collect();

    let found = inventory::find_by_code(&items, code.trim())
        .ok_or_else(|| ApiError::NotFound(format!("No inventory item with code '{}'", code)))?;

    pairs
        .into_iter()
        .find(|(_, item)| item.id == found.id)
        .map(|(row, _)| Json(row))
        .ok_or_else(|| ApiError::Internal("inventory lookup lost its row".to_string()))
}

/// GET /api/v1/inventory/summary
pub async fn summary(State(state): State<Arc<AppState>>) -> ApiResult<Json<StockSummary>> {
    let items: Vec<InventoryItem> = load_items(&state)?.into_iter().map(|(_, item)| item).collect();
    Ok(Json(inventory::summarize(&items)))
}
