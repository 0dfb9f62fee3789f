//! Import Routes
//!
//! - POST /api/v1/import/:table - CSV body with a header row
//!
//! `?dry_run=true` validates without storing; `?delimiter=;` switches the
//! separator.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::ImportParams;
use crate::api::error::{ApiError, ApiResult};
use crate::api::routes::tables::table_kind;
use crate::api::state::AppState;
use crate::import::{CsvImportResult, CsvImporter};

/// POST /api/v1/import/:table
pub async fn import_csv(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(params): Query<ImportParams>,
    body: Bytes,
) -> ApiResult<Json<CsvImportResult>> {
    let kind = table_kind(&table)?;

    let mut importer = CsvImporter::new(kind);
    if let Some(delimiter) = params.delimiter {
        if !delimiter.is_ascii() {
            return Err(ApiError::BadRequest(format!(
                "Delimiter must be a single ASCII character, got '{}'",
                delimiter
            )));
        }
        importer = importer.with_delimiter(delimiter as u8);
    }

    let result = if params.dry_run {
        importer.parse(&body)?
    } else {
        importer.import_into(&state.tables, &body)?
    };
    Ok(Json(result))
}
