//! Forwarding of store change events into the hub

use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use super::hub::ConnectionHub;
use super::messages::WsEvent;
use crate::tables::RecordEvent;
use crate::vault::StorageEvent;

/// Relay vault and table events to WebSocket subscribers until both
/// channels close
pub fn forward_events(
    hub: Arc<ConnectionHub>,
    mut vault: broadcast::Receiver<StorageEvent>,
    mut tables: broadcast::Receiver<RecordEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut vault_open = true;
        let mut tables_open = true;

        while vault_open || tables_open {
            tokio::select! {
                received = vault.recv(), if vault_open => match received {
                    Ok(event) => {
                        hub.broadcast(&WsEvent::storage(&event)).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "WebSocket relay fell behind vault events");
                    }
                    Err(RecvError::Closed) => vault_open = false,
                },
                received = tables.recv(), if tables_open => match received {
                    Ok(event) => {
                        hub.broadcast(&WsEvent::record(&event)).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "WebSocket relay fell behind table events");
                    }
                    Err(RecvError::Closed) => tables_open = false,
                },
            }
        }

        tracing::debug!("Event relay stopped");
    })
}
