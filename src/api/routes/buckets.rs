//! Bucket Routes
//!
//! File uploads for statements, receipts, employee photos and logos.
//!
//! - GET /api/v1/buckets - Configured bucket names
//! - GET /api/v1/buckets/:bucket - List objects
//! - POST /api/v1/buckets/:bucket?filename=... - Upload the raw request body
//! - GET /api/v1/objects/*path - Download an object
//! - DELETE /api/v1/objects/*path - Delete an object

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{DeleteResponse, UploadParams, UploadResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::buckets::{content_type, ObjectInfo};

/// GET /api/v1/buckets
pub async fn list_buckets(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.objects.buckets().to_vec())
}

/// GET /api/v1/buckets/:bucket
pub async fn list_objects(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
) -> ApiResult<Json<Vec<ObjectInfo>>> {
    Ok(Json(state.objects.list(&bucket).await?))
}

/// POST /api/v1/buckets/:bucket
pub async fn upload_object(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("empty upload".to_string()));
    }
    let path = state.objects.upload(&bucket, &params.filename, &body).await?;
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            path,
            size: body.len(),
        }),
    ))
}

/// GET /api/v1/objects/*path
pub async fn download_object(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let path = path.trim_start_matches('/');
    let bytes = state.objects.download(path).await?;
    Ok(([(header::CONTENT_TYPE, content_type(path))], bytes))
}

/// DELETE /api/v1/objects/*path
pub async fn delete_object(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let path = path.trim_start_matches('/');
    if !state.objects.remove(path).await? {
        return Err(ApiError::NotFound(format!("Object '{}' does not exist", path)));
    }
    Ok(Json(DeleteResponse { deleted: true }))
}
