//! BizDesk REST API
//!
//! HTTP API layer for BizDesk, built with Axum.
//!
//! # Endpoints
//!
//! ## Tables
//! - `GET /api/v1/tables` - Row counts
//! - `GET|POST /api/v1/tables/:table` - List (`q`, `sort`, `dir`, `limit`, `offset`, filters) / create
//! - `GET|PUT|DELETE /api/v1/tables/:table/:id` - Read / merge-update / delete
//!
//! ## Vault
//! - `GET /api/v1/vault` - Keys and tier statistics
//! - `POST /api/v1/vault/backup` - Back up critical keys now
//! - `GET|PUT|DELETE /api/v1/vault/:key`
//! - `GET /api/v1/vault/:key/backups`, `POST /api/v1/vault/:key/restore`
//!
//! ## Files
//! - `GET /api/v1/buckets`, `GET|POST /api/v1/buckets/:bucket`
//! - `GET|DELETE /api/v1/objects/*path`
//!
//! ## Documents
//! - `GET /api/v1/reports/{invoices/:id,payroll/:id,transactions,inventory}?format=pdf|csv|text`
//! - `POST /api/v1/import/:table` - CSV upload
//! - `GET /api/v1/inventory/barcode/:code`, `GET /api/v1/inventory/summary`
//!
//! ## Health
//! - `GET /health/live` - Liveness check
//! - `GET /health/ready` - Readiness check
//! - `GET /health` - Full health status
//!
//! ## WebSocket
//! - `GET /api/v1/ws` - Change notifications
//!
//! Everything under `/api/v1` requires `Authorization: Bearer <token>` when
//! `api.api_token` is configured.

pub mod auth;
pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ApiConfig;
use crate::websocket::{forward_events, websocket_handler};

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let config = Arc::clone(&state.config);
    let shared_state = Arc::new(state);

    let api_routes = Router::new()
        // Tables
        .route("/tables", get(routes::tables::table_counts))
        .route(
            "/tables/:table",
            get(routes::tables::list_records).post(routes::tables::create_record),
        )
        .route(
            "/tables/:table/:id",
            get(routes::tables::get_record)
                .put(routes::tables::update_record)
                .delete(routes::tables::delete_record),
        )
        // Vault
        .route("/vault", get(routes::vault::overview))
        .route("/vault/backup", post(routes::vault::backup_now))
        .route(
            "/vault/:key",
            get(routes::vault::get_value)
                .put(routes::vault::put_value)
                .delete(routes::vault::delete_value),
        )
        .route("/vault/:key/backups", get(routes::vault::list_backups))
        .route("/vault/:key/restore", post(routes::vault::restore))
        // Buckets
        .route("/buckets", get(routes::buckets::list_buckets))
        .route(
            "/buckets/:bucket",
            get(routes::buckets::list_objects).post(routes::buckets::upload_object),
        )
        .route(
            "/objects/*path",
            get(routes::buckets::download_object).delete(routes::buckets::delete_object),
        )
        // Reports
        .route("/reports/invoices/:id", get(routes::reports::invoice))
        .route("/reports/payroll/:id", get(routes::reports::payroll))
        .route("/reports/transactions", get(routes::reports::transactions))
        .route("/reports/inventory", get(routes::reports::inventory))
        // Import and inventory helpers
        .route("/import/:table", post(routes::import::import_csv))
        .route("/inventory/barcode/:code", get(routes::inventory::lookup_barcode))
        .route("/inventory/summary", get(routes::inventory::summary))
        .layer(DefaultBodyLimit::max(config.max_body_mb * 1024 * 1024))
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs.max(1))))
        // Long-lived, so outside the request timeout
        .route("/ws", get(websocket_handler))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&shared_state),
            auth::require_token,
        ));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins))
        .with_state(shared_state)
}

/// CORS for the configured origins; `*` allows any
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the API server
///
/// Store change events are relayed to WebSocket clients for as long as the
/// server runs. Returns after a graceful shutdown.
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let relay = forward_events(
        Arc::clone(&state.ws_hub),
        state.vault.subscribe(),
        state.tables.subscribe(),
    );
    if !state.vault.has_persistent_tier() {
        tracing::warn!("No persistent storage tier, WebSocket clients are told on connect");
    }

    let router = build_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("BizDesk API listening on {}", addr);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    relay.abort();
    served.map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("BizDesk API shut down gracefully");
    Ok(())
}

/// Wait for Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buckets::{ObjectStore, DEFAULT_BUCKETS};
    use crate::tables::TableStore;
    use crate::vault::{DirBackend, FallbackStore, StorageBackend, Tier, VaultConfig};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tempfile::tempdir;
    use tower::util::ServiceExt;

    async fn create_test_app_with(api_config: ApiConfig) -> (Router, tempfile::TempDir) {
        let dir = tempdir().unwrap();

        let local: Arc<dyn StorageBackend> =
            Arc::new(DirBackend::open(dir.path().join("local"), Tier::Local).unwrap());
        let vault = Arc::new(FallbackStore::with_backends(
            vec![local],
            VaultConfig::new(dir.path()),
        ));
        let tables = Arc::new(TableStore::open_in_memory().unwrap());
        let buckets: Vec<String> = DEFAULT_BUCKETS.iter().map(|b| b.to_string()).collect();
        let objects = Arc::new(
            ObjectStore::open(dir.path().join("buckets"), &buckets, 1024 * 1024)
                .await
                .unwrap(),
        );

        let state = AppState::new(vault, tables, objects, api_config);
        (build_router(state), dir)
    }

    async fn create_test_app() -> (Router, tempfile::TempDir) {
        create_test_app_with(ApiConfig::default()).await
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let (app, _dir) = create_test_app().await;

        for uri in ["/health/live", "/health/ready"] {
            assert_eq!(send(&app, "GET", uri, None).await.status(), StatusCode::OK);
        }

        let response = send(&app, "GET", "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["vault"], "ok");
    }

    #[tokio::test]
    async fn test_create_client_reports_missing_fields() {
        let (app, _dir) = create_test_app().await;

        let response = send(&app, "POST", "/api/v1/tables/clients", Some(json!({"kind": "company"}))).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        let missing = body["error"]["details"]["missing"].as_array().unwrap();
        assert!(missing.contains(&json!("company_name")));
        assert!(missing.contains(&json!("email")));
        assert!(body["request_id"].is_string());
    }

    #[tokio::test]
    async fn test_table_crud_and_listing() {
        let (app, _dir) = create_test_app().await;

        for (name, email) in [("Zeta Corp", "z@zeta.test"), ("Acme", "info@acme.test")] {
            let response = send(
                &app,
                "POST",
                "/api/v1/tables/clients",
                Some(json!({"company_name": name, "email": email})),
            )
            .await;
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = send(&app, "GET", "/api/v1/tables/clients?sort=company_name&dir=asc", None).await;
        let body = json_body(response).await;
        assert_eq!(body["total"], 2);
        assert_eq!(body["rows"][0]["company_name"], "Acme");

        let response = send(&app, "GET", "/api/v1/tables/clients?q=zeta", None).await;
        let body = json_body(response).await;
        assert_eq!(body["total"], 1);
        let id = body["rows"][0]["id"].as_str().unwrap().to_string();

        let uri = format!("/api/v1/tables/clients/{}", id);
        let response = send(&app, "PUT", &uri, Some(json!({"phone": "555-0100"}))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["phone"], "555-0100");

        // Blanking a required field is rejected
        let response = send(&app, "PUT", &uri, Some(json!({"email": ""}))).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        assert_eq!(send(&app, "DELETE", &uri, None).await.status(), StatusCode::OK);
        assert_eq!(send(&app, "GET", &uri, None).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let (app, _dir) = create_test_app().await;
        let response = send(&app, "GET", "/api/v1/tables/metrics", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_vault_round_trip() {
        let (app, _dir) = create_test_app().await;

        let response = send(&app, "PUT", "/api/v1/vault/user_settings", Some(json!({"theme": "dark"}))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["degraded"], false);
        assert_eq!(body["written"], json!(["local"]));

        let body = json_body(send(&app, "GET", "/api/v1/vault/user_settings", None).await).await;
        assert_eq!(body["value"]["theme"], "dark");

        // Critical key, so backup-on-write kept a copy
        let body = json_body(send(&app, "GET", "/api/v1/vault/user_settings/backups", None).await).await;
        assert_eq!(body["backups"].as_array().unwrap().len(), 1);

        let response = send(&app, "DELETE", "/api/v1/vault/user_settings", None).await;
        assert_eq!(json_body(response).await["deleted"], true);
        let response = send(&app, "GET", "/api/v1/vault/user_settings", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_vault_rejects_backup_keys() {
        let (app, _dir) = create_test_app().await;
        let response = send(&app, "PUT", "/api/v1/vault/x__backup_1", Some(json!(1))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_token_gate() {
        let config = ApiConfig {
            api_token: Some("s3cret".to_string()),
            ..ApiConfig::default()
        };
        let (app, _dir) = create_test_app_with(config).await;

        let response = send(&app, "GET", "/api/v1/tables", None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .uri("/api/v1/tables")
            .header("Authorization", "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Health stays open
        assert_eq!(send(&app, "GET", "/health/live", None).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_query_token_with_reserved_characters() {
        let config = ApiConfig {
            api_token: Some("a+b/c==".to_string()),
            ..ApiConfig::default()
        };
        let (app, _dir) = create_test_app_with(config).await;

        let response = send(&app, "GET", "/api/v1/tables?token=a%2Bb%2Fc%3D%3D", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, "GET", "/api/v1/tables?token=a%2Bb%2Fc", None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_upload_and_download() {
        let (app, _dir) = create_test_app().await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/buckets/transaction-receipts?filename=taxi%20receipt.pdf")
            .body(Body::from("%PDF-1.4 fake"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let path = json_body(response).await["path"].as_str().unwrap().to_string();
        assert!(path.starts_with("transaction-receipts/"));
        assert!(path.ends_with("-taxi_receipt.pdf"));

        let response = send(&app, "GET", &format!("/api/v1/objects/{}", path), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/pdf");

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/buckets/nope?filename=a.txt")
            .body(Body::from("hello"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_import_then_barcode_and_report() {
        let (app, _dir) = create_test_app().await;

        let csv = "Name,SKU,Barcode,Quantity,Unit Cost\nStapler,ST-01,4006381333931,12,4.50\n,MISSING,,1,1\n";
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/import/inventory")
            .body(Body::from(csv))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["rows"].as_array().unwrap().len(), 1);
        assert_eq!(body["rows_failed"], 1);

        let response = send(&app, "GET", "/api/v1/inventory/barcode/4006381333931", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["name"], "Stapler");

        let response = send(&app, "GET", "/api/v1/inventory/barcode/0000", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app, "GET", "/api/v1/reports/inventory?format=csv", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/csv; charset=utf-8");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("Stapler"));

        let response = send(&app, "GET", "/api/v1/reports/inventory?format=docx", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invoice_pdf() {
        let (app, _dir) = create_test_app().await;

        let invoice = json!({
            "kind": "invoice",
            "number": "INV-7",
            "client_id": "c-1",
            "issue_date": "2024-03-01",
            "items": [{"description": "Consulting", "quantity": 2.0, "unit_price": 150.0}]
        });
        let response = send(&app, "POST", "/api/v1/tables/invoices", Some(invoice)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = json_body(response).await["id"].as_str().unwrap().to_string();

        let response = send(&app, "GET", &format!("/api/v1/reports/invoices/{}", id), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/pdf");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }
}
