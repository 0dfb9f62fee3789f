//! # BizDesk
//!
//! Small-business management backend: clients, invoices and quotes, HR,
//! inventory and bank statements, persisted through a multi-tier fallback
//! store and served over a REST API.
//!
//! ## Modules
//!
//! - [`vault`]: Multi-tier key/value persistence with timestamped backups
//! - [`domain`]: Entity records and required-field validation
//! - [`listing`]: Search, filter and sort over JSON rows
//! - [`tables`]: SQLite-backed record tables
//! - [`buckets`]: Directory-backed object storage
//! - [`report`]: Text, CSV and PDF documents
//! - [`import`]: CSV import of table rows
//! - [`api`]: REST API server with Axum
//! - [`websocket`]: Change notifications
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bizdesk::vault::{FallbackStore, VaultConfig};
//! use bizdesk::domain::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let vault = FallbackStore::open(VaultConfig::new("bizdesk_data/vault")).await;
//!
//!     let clients = vec![Client::company("Acme Ltd", "ap@acme.com")];
//!     let outcome = vault.save("clients", &clients).await?;
//!     if outcome.is_degraded() {
//!         eprintln!("clients are only held in memory");
//!     }
//!
//!     let loaded: Vec<Client> = vault.get_or("clients", Vec::new()).await;
//!     println!("{} clients", loaded.len());
//!
//!     vault.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod buckets;
pub mod config;
pub mod domain;
pub mod import;
pub mod listing;
pub mod logging;
pub mod report;
pub mod tables;
pub mod vault;
pub mod websocket;

// Re-export top-level types for convenience
pub use vault::{
    FallbackStore, SaveOutcome, StorageBackend, StorageEvent, Tier, VaultConfig, VaultError,
    VaultResult, VaultStats,
};

pub use domain::{TableKind, Validate, ValidationError};

pub use listing::{ListQuery, Listing, SortDirection};

pub use tables::{TableError, TableStore};

pub use buckets::{BucketError, ObjectStore};

pub use report::{Report, ReportError, ReportFormat};

pub use import::{CsvImportResult, CsvImporter, ImportError};

pub use api::{build_router, serve, ApiError, AppState};

pub use websocket::{ClientMessage, ConnectionHub, HubConfig, HubError, ServerMessage, WsEvent};

pub use config::{ApiConfig, Config, ConfigError, LoggingConfig};
