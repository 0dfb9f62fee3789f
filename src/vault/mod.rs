//! BizDesk Vault
//!
//! Best-effort redundant key/value persistence across a chain of tiers:
//!
//! - **backend**: The `StorageBackend` trait and `Tier` ordering
//! - **dir**: Directory tier (durable local files, or a wiped session scratch dir)
//! - **sqlite**: Indexed tier on SQLite, opened under a timeout
//! - **memory**: Last-resort in-process map
//! - **envelope**: Stamped value wrapper and checksummed backup entries
//! - **store**: `FallbackStore` orchestrating writes, reads, backups and restores
//! - **events**: Change notifications
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//!   value → Envelope(stamp) → Local → Session → Indexed   (every tier attempted)
//!                                   ↘ Memory               (only if all failed)
//!
//! Read Path:
//!   key → every tier → freshest stamp wins
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use bizdesk::vault::{FallbackStore, VaultConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = FallbackStore::open(VaultConfig::new("./data")).await;
//!
//!     let outcome = store.save("user_settings", &vec!["dark_mode"]).await.unwrap();
//!     if outcome.is_degraded() {
//!         eprintln!("settings only kept in memory");
//!     }
//!
//!     let settings: Vec<String> = store.get_or("user_settings", Vec::new()).await;
//!     println!("{:?}", settings);
//!
//!     store.shutdown().await;
//! }
//! ```

pub mod backend;
pub mod dir;
pub mod envelope;
pub mod error;
pub mod events;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use backend::{StorageBackend, Tier};
pub use dir::DirBackend;
pub use envelope::{backup_key, is_backup_key, parse_backup_key, BackupEntry, Envelope};
pub use error::{VaultError, VaultResult};
pub use events::{StorageEvent, StorageEventKind};
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;
pub use store::{
    default_critical_keys, default_session_dir, FallbackStore, SaveOutcome, TierStats, VaultConfig,
    VaultStats, MAX_KEY_BYTES,
};
