//! JSON frames exchanged on `/api/v1/ws`, tagged by `type`

use serde::{Deserialize, Serialize};

use crate::tables::{RecordAction, RecordEvent};
use crate::vault::{StorageEvent, StorageEventKind};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// e.g. `{"type":"subscribe","topics":["vault.clients","tables.*"]}`
    Subscribe { topics: Vec<String> },
    Unsubscribe { topics: Vec<String> },
    Ping,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A vault key changed
    StorageChanged {
        key: String,
        kind: StorageEventKind,
        stamp: u64,
    },
    /// A table row changed
    RecordChanged {
        table: String,
        id: String,
        action: RecordAction,
    },
    /// Server notice (startup, shutdown, degraded storage)
    System {
        message: String,
    },
    /// Topics accepted from a subscribe request
    Subscribed { topics: Vec<String> },
    Unsubscribed { topics: Vec<String> },
    Pong,
    Error { message: String },
    /// First frame on every accepted socket
    Connected { connection_id: String },
}

/// A server message addressed to one topic
#[derive(Debug, Clone)]
pub struct WsEvent {
    pub topic: String,
    pub message: ServerMessage,
}

impl WsEvent {
    /// Vault change, published on `vault.{key}`
    pub fn storage(event: &StorageEvent) -> Self {
        Self {
            topic: format!("vault.{}", event.key),
            message: ServerMessage::StorageChanged {
                key: event.key.clone(),
                kind: event.kind,
                stamp: event.stamp,
            },
        }
    }

    /// Row change, published on `tables.{table}`
    pub fn record(event: &RecordEvent) -> Self {
        Self {
            topic: format!("tables.{}", event.table),
            message: ServerMessage::RecordChanged {
                table: event.table.clone(),
                id: event.id.clone(),
                action: event.action,
            },
        }
    }

    pub fn system(message: &str) -> Self {
        Self {
            topic: "system".to_string(),
            message: ServerMessage::System {
                message: message.to_string(),
            },
        }
    }
}
