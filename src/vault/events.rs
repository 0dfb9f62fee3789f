//! Storage change notifications
//!
//! Published on every save/remove/restore/backup so other parts of the
//! process (and WebSocket clients) can refresh. Events are informational only;
//! concurrent writers are not reconciled and the last write wins.

use serde::Serialize;

/// What happened to a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageEventKind {
    Saved,
    Removed,
    Restored,
    BackedUp,
}

/// A change to a vault key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageEvent {
    pub key: String,
    pub kind: StorageEventKind,
    /// Stamp of the value involved (0 for removals)
    pub stamp: u64,
}

impl StorageEvent {
    pub fn new(key: impl Into<String>, kind: StorageEventKind, stamp: u64) -> Self {
        Self {
            key: key.into(),
            kind,
            stamp,
        }
    }
}
