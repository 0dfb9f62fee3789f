//! Stores and settings shared by every handler

use std::sync::Arc;
use std::time::Instant;

use crate::buckets::ObjectStore;
use crate::config::ApiConfig;
use crate::tables::TableStore;
use crate::vault::FallbackStore;
use crate::websocket::{ConnectionHub, HubConfig};

#[derive(Clone)]
pub struct AppState {
    pub vault: Arc<FallbackStore>,
    pub tables: Arc<TableStore>,
    pub objects: Arc<ObjectStore>,
    pub config: Arc<ApiConfig>,
    pub start_time: Instant,
    /// Change notifications for `/api/v1/ws` clients
    pub ws_hub: Arc<ConnectionHub>,
}

impl AppState {
    pub fn new(
        vault: Arc<FallbackStore>,
        tables: Arc<TableStore>,
        objects: Arc<ObjectStore>,
        config: ApiConfig,
    ) -> Self {
        Self::with_ws_config(vault, tables, objects, config, HubConfig::default())
    }

    /// Same as `new` with a custom socket limit
    pub fn with_ws_config(
        vault: Arc<FallbackStore>,
        tables: Arc<TableStore>,
        objects: Arc<ObjectStore>,
        config: ApiConfig,
        hub_config: HubConfig,
    ) -> Self {
        Self {
            vault,
            tables,
            objects,
            config: Arc::new(config),
            start_time: Instant::now(),
            ws_hub: Arc::new(ConnectionHub::new(hub_config)),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub async fn ws_connection_count(&self) -> usize {
        self.ws_hub.connection_count().await
    }
}
