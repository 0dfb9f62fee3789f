//! Liveness, readiness and the status page used by `bizdesk-cli status`
//!
//! - GET /health/live
//! - GET /health/ready
//! - GET /health

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;

/// GET /health/live
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Ready once the table database answers. A vault running on memory alone
/// still serves traffic; `/health` reports it as degraded.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    if check_tables_health(&state) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health
///
/// `degraded` when either the vault is memory-only or the table database
/// fails, `unhealthy` when both do.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let vault_ok = state.vault.has_persistent_tier();
    let tables_ok = check_tables_health(&state);

    let status = match (vault_ok, tables_ok) {
        (true, true) => "healthy",
        (false, false) => "unhealthy",
        _ => "degraded",
    };

    Json(HealthResponse {
        status: status.to_string(),
        vault: if vault_ok { "ok" } else { "memory_only" }.to_string(),
        tables: if tables_ok { "ok" } else { "error" }.to_string(),
        uptime_seconds: state.uptime_seconds(),
        websocket_connections: state.ws_connection_count().await,
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage: state.vault.stats().await,
    })
}

fn check_tables_health(state: &AppState) -> bool {
    match state.tables.counts() {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Table database health check failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness_needs_no_state() {
        assert_eq!(liveness().await, StatusCode::OK);
    }
}
