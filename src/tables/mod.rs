//! Hosted database tables
//!
//! JSON rows grouped by table name, persisted in SQLite. Which table names are
//! accepted, and what a valid row looks like, is decided by
//! [`crate::domain::TableKind`] at the API edge.

pub mod error;
pub mod store;

pub use error::{TableError, TableResult};
pub use store::{merge_patch, RecordAction, RecordEvent, TableCount, TableStore};
