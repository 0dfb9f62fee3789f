//! Fallback store
//!
//! Orchestrates the tier chain:
//! - Write path: value → envelope(stamp) → every tier in order → memory if none accepted
//! - Read path: every tier → freshest envelope by stamp
//! - Backups: timestamped copies per key, pruned to `max_backups`
//!
//! There is no transaction across tiers. A write that one tier accepted may be
//! missing from another; the stamp lets reads pick the newest copy anyway.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval_at, Duration, Instant};

use super::backend::{StorageBackend, Tier};
use super::dir::DirBackend;
use super::envelope::{parse_backup_key, BackupEntry, Envelope, BACKUP_MARKER};
use super::error::{VaultError, VaultResult};
use super::events::{StorageEvent, StorageEventKind};
use super::memory::MemoryBackend;
use super::sqlite::SqliteBackend;

/// Longest accepted key, in bytes
///
/// Directory tiers hex-encode keys into `{hex}.json` file names. The longest
/// backup name (`key`, marker, 20-digit stamp) must stay within 255 bytes.
pub const MAX_KEY_BYTES: usize = (255 - ".json".len()) / 2 - BACKUP_MARKER.len() - 20;

/// Configuration for the fallback store
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Root directory for the local and indexed tiers
    pub data_dir: PathBuf,
    /// Scratch directory for the session tier (wiped on open)
    pub session_dir: PathBuf,
    /// Keys that are backed up periodically and restored at startup
    pub critical_keys: Vec<String>,
    /// Backups retained per key (default: 3)
    pub max_backups: usize,
    /// Interval of the background backup task in seconds (default: 300)
    pub backup_interval_secs: u64,
    /// How long the indexed tier may take to open (default: 2000)
    pub indexed_open_timeout_ms: u64,
    /// Largest value the local tier accepts (default: 5MB)
    pub max_entry_bytes: Option<usize>,
    /// Take a backup whenever a critical key is saved
    pub backup_on_write: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("bizdesk_data"),
            session_dir: default_session_dir(),
            critical_keys: default_critical_keys(),
            max_backups: 3,
            backup_interval_secs: 300,
            indexed_open_timeout_ms: 2000,
            max_entry_bytes: Some(5 * 1024 * 1024),
            backup_on_write: true,
        }
    }
}

/// Per-process scratch directory for the session tier
pub fn default_session_dir() -> PathBuf {
    std::env::temp_dir().join(format!("bizdesk-session-{}", std::process::id()))
}

/// Keys treated as high-value by default
pub fn default_critical_keys() -> Vec<String> {
    [
        "company_data",
        "clients",
        "invoices",
        "employees",
        "inventory",
        "user_settings",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl VaultConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            session_dir: data_dir.join("session"),
            data_dir,
            ..Default::default()
        }
    }

    /// Directory of the local tier
    pub fn local_dir(&self) -> PathBuf {
        self.data_dir.join("local")
    }

    /// Database file of the indexed tier
    pub fn indexed_path(&self) -> PathBuf {
        self.data_dir.join("indexed.db")
    }

    pub fn is_critical(&self, key: &str) -> bool {
        self.critical_keys.iter().any(|k| k == key)
    }
}

/// Result of a save across the tier chain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveOutcome {
    pub key: String,
    pub stamp: u64,
    /// Tiers that accepted the write
    pub written: Vec<Tier>,
    /// Tiers that rejected it, with the reason
    pub failed: Vec<(Tier, String)>,
}

impl SaveOutcome {
    /// True when the value only lives in process memory
    pub fn is_degraded(&self) -> bool {
        self.written.iter().all(|t| *t == Tier::Memory)
    }
}

/// The multi-tier store
pub struct FallbackStore {
    config: VaultConfig,
    /// Non-memory tiers in fallback order
    tiers: Vec<Arc<dyn StorageBackend>>,
    /// Tiers that failed to open
    unavailable: Vec<Tier>,
    memory: Arc<MemoryBackend>,
    last_stamp: AtomicU64,
    events: broadcast::Sender<StorageEvent>,
    shutdown: Arc<RwLock<bool>>,
}

impl FallbackStore {
    /// Open the standard chain: local dir, session dir, SQLite, memory
    ///
    /// Tiers that cannot be opened are skipped with a warning; the store always
    /// opens. Critical keys with no live value are restored from backups.
    pub async fn open(config: VaultConfig) -> Self {
        let mut tiers: Vec<Arc<dyn StorageBackend>> = Vec::new();
        let mut unavailable = Vec::new();

        match DirBackend::open(config.local_dir(), Tier::Local) {
            Ok(backend) => {
                let backend = match config.max_entry_bytes {
                    Some(limit) => backend.max_entry_bytes(limit),
                    None => backend,
                };
                tiers.push(Arc::new(backend));
            }
            Err(e) => {
                tracing::warn!(tier = %Tier::Local, error = %e, "Storage tier unavailable");
                unavailable.push(Tier::Local);
            }
        }

        match DirBackend::session(&config.session_dir) {
            Ok(backend) => tiers.push(Arc::new(backend)),
            Err(e) => {
                tracing::warn!(tier = %Tier::Session, error = %e, "Storage tier unavailable");
                unavailable.push(Tier::Session);
            }
        }

        let timeout = Duration::from_millis(config.indexed_open_timeout_ms);
        match SqliteBackend::open_with_timeout(&config.indexed_path(), timeout).await {
            Ok(backend) => tiers.push(Arc::new(backend)),
            Err(e) => {
                tracing::warn!(tier = %Tier::Indexed, error = %e, "Storage tier unavailable");
                unavailable.push(Tier::Indexed);
            }
        }

        if tiers.is_empty() {
            tracing::error!("No storage tier available, values will only live in memory");
        }

        let mut store = Self::with_backends(tiers, config);
        store.unavailable = unavailable;

        let restored = store.restore_missing_critical().await;
        if restored > 0 {
            tracing::info!("Restored {} critical keys from backups", restored);
        }

        store
    }

    /// Build a store over an explicit chain of non-memory tiers
    pub fn with_backends(backends: Vec<Arc<dyn StorageBackend>>, config: VaultConfig) -> Self {
        let (events, _) = broadcast::channel(256);
        let tiers = backends
            .into_iter()
            .filter(|b| b.tier() != Tier::Memory)
            .collect();

        Self {
            config,
            tiers,
            unavailable: Vec::new(),
            memory: Arc::new(MemoryBackend::new()),
            last_stamp: AtomicU64::new(0),
            events,
            shutdown: Arc::new(RwLock::new(false)),
        }
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Receive change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }

    /// Whether at least one non-memory tier is in the chain
    pub fn has_persistent_tier(&self) -> bool {
        !self.tiers.is_empty()
    }

    /// Save a value under `key` in every tier that accepts it
    pub async fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> VaultResult<SaveOutcome> {
        validate_key(key)?;
        let data = serde_json::to_value(value)?;
        let outcome = self.write_envelope(key, data).await?;

        self.publish(StorageEvent::new(key, StorageEventKind::Saved, outcome.stamp));

        if self.config.backup_on_write && self.config.is_critical(key) {
            if let Err(e) = self.backup(key).await {
                tracing::warn!(key = %key, error = %e, "Backup on write failed");
            }
        }

        Ok(outcome)
    }

    /// Read the freshest value for `key`
    ///
    /// Tier read errors and undecodable copies are logged and skipped.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let envelope = self.read_freshest(key).await?;
        match serde_json::from_value(envelope.data) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Stored value has unexpected shape");
                None
            }
        }
    }

    /// Read `key`, falling back to `default`
    pub async fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).await.unwrap_or(default)
    }

    /// Remove `key` and its backups from every tier
    pub async fn remove(&self, key: &str) -> VaultResult<bool> {
        validate_key(key)?;

        let mut existed = false;
        for backend in self.chain() {
            match backend.remove(key).await {
                Ok(removed) => existed |= removed,
                Err(e) => {
                    tracing::warn!(key = %key, tier = %backend.tier(), error = %e, "Storage tier remove failed")
                }
            }
        }

        for (_, storage_key) in self.backup_keys(key).await {
            self.remove_everywhere(&storage_key).await;
        }

        self.publish(StorageEvent::new(key, StorageEventKind::Removed, 0));
        Ok(existed)
    }

    /// Snapshot the current value of `key` and prune old backups
    pub async fn backup(&self, key: &str) -> VaultResult<BackupEntry> {
        validate_key(key)?;
        let envelope = self
            .read_freshest(key)
            .await
            .ok_or_else(|| VaultError::KeyNotFound(key.to_string()))?;

        let entry = BackupEntry::new(key, self.next_stamp(), envelope.data)?;
        let raw = entry.encode()?;
        self.write_raw(&entry.storage_key(), &raw).await;

        let pruned = self.prune_backups(key).await;
        tracing::debug!(key = %key, stamp = entry.stamp, pruned, "Backup written");

        self.publish(StorageEvent::new(key, StorageEventKind::BackedUp, entry.stamp));
        Ok(entry)
    }

    /// Valid backups of `key`, newest first
    pub async fn backups(&self, key: &str) -> Vec<BackupEntry> {
        let mut entries = Vec::new();
        for (_, storage_key) in self.backup_keys(key).await.into_iter().rev() {
            if let Some(entry) = self.load_backup(&storage_key).await {
                entries.push(entry);
            }
        }
        entries
    }

    /// Replace the live value of `key` with its newest valid backup
    pub async fn restore(&self, key: &str) -> VaultResult<BackupEntry> {
        validate_key(key)?;
        let entry = self
            .backups(key)
            .await
            .into_iter()
            .next()
            .ok_or_else(|| VaultError::KeyNotFound(format!("{} (no valid backup)", key)))?;

        let outcome = self.write_envelope(key, entry.data.clone()).await?;
        tracing::info!(key = %key, backup_stamp = entry.stamp, "Restored from backup");

        self.publish(StorageEvent::new(key, StorageEventKind::Restored, outcome.stamp));
        Ok(entry)
    }

    /// Back up every critical key that currently has a value
    pub async fn backup_all_critical(&self) -> usize {
        let mut count = 0;
        for key in &self.config.critical_keys {
            if self.read_freshest(key).await.is_none() {
                continue;
            }
            match self.backup(key).await {
                Ok(_) => count += 1,
                Err(e) => tracing::warn!(key = %key, error = %e, "Critical key backup failed"),
            }
        }
        count
    }

    /// Restore every critical key that has a backup but no live value
    pub async fn restore_missing_critical(&self) -> usize {
        let mut count = 0;
        for key in &self.config.critical_keys {
            if self.read_freshest(key).await.is_some() {
                continue;
            }
            if self.backup_keys(key).await.is_empty() {
                continue;
            }
            match self.restore(key).await {
                Ok(_) => count += 1,
                Err(e) => tracing::warn!(key = %key, error = %e, "Critical key restore failed"),
            }
        }
        count
    }

    /// Start the periodic critical-key backup task
    pub fn start_background_backup(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        let period = Duration::from_secs(store.config.backup_interval_secs.max(1));

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);

            loop {
                ticker.tick().await;

                if *store.shutdown.read().await {
                    break;
                }

                let count = store.backup_all_critical().await;
                tracing::debug!("Background backup covered {} critical keys", count);
            }
        })
    }

    /// Stop background work and take a final backup of critical keys
    pub async fn shutdown(&self) -> usize {
        *self.shutdown.write().await = true;
        let count = self.backup_all_critical().await;
        tracing::info!("Final backup covered {} critical keys", count);
        count
    }

    /// Per-tier statistics
    pub async fn stats(&self) -> VaultStats {
        let mut tiers = Vec::new();

        for backend in self.chain() {
            let (keys, backups) = match backend.keys().await {
                Ok(all) => {
                    let backups = all.iter().filter(|k| parse_backup_key(k).is_some()).count();
                    (all.len() - backups, backups)
                }
                Err(e) => {
                    tracing::warn!(tier = %backend.tier(), error = %e, "Failed to list keys");
                    (0, 0)
                }
            };
            tiers.push(TierStats {
                tier: backend.tier(),
                available: true,
                keys,
                backups,
            });
        }

        for tier in &self.unavailable {
            tiers.push(TierStats {
                tier: *tier,
                available: false,
                keys: 0,
                backups: 0,
            });
        }

        tiers.sort_by_key(|t| t.tier);
        VaultStats { tiers }
    }

    /// Every live (non-backup) key across all tiers
    pub async fn keys(&self) -> Vec<String> {
        let mut keys = std::collections::BTreeSet::new();
        for backend in self.chain() {
            if let Ok(all) = backend.keys().await {
                keys.extend(all.into_iter().filter(|k| parse_backup_key(k).is_none()));
            }
        }
        keys.into_iter().collect()
    }

    fn chain(&self) -> Vec<&dyn StorageBackend> {
        let mut chain: Vec<&dyn StorageBackend> = self.tiers.iter().map(|b| b.as_ref()).collect();
        chain.push(self.memory.as_ref());
        chain
    }

    fn publish(&self, event: StorageEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    /// Issue a stamp strictly greater than every stamp seen so far
    fn next_stamp(&self) -> u64 {
        let now = Utc::now().timestamp_micros().max(0) as u64;
        let mut prev = self.last_stamp.load(Ordering::SeqCst);
        loop {
            let next = now.max(prev + 1);
            match self
                .last_stamp
                .compare_exchange(prev, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }

    async fn write_envelope(&self, key: &str, data: Value) -> VaultResult<SaveOutcome> {
        let stamp = self.next_stamp();
        let raw = Envelope::new(stamp, data).encode()?;
        let (written, failed) = self.write_raw(key, &raw).await;

        Ok(SaveOutcome {
            key: key.to_string(),
            stamp,
            written,
            failed,
        })
    }

    async fn write_raw(&self, key: &str, raw: &str) -> (Vec<Tier>, Vec<(Tier, String)>) {
        let mut written = Vec::new();
        let mut failed = Vec::new();

        for backend in &self.tiers {
            match backend.set(key, raw).await {
                Ok(()) => written.push(backend.tier()),
                Err(e) => {
                    tracing::warn!(key = %key, tier = %backend.tier(), error = %e, "Storage tier write failed");
                    failed.push((backend.tier(), e.to_string()));
                }
            }
        }

        if written.is_empty() {
            tracing::error!(
                key = %key,
                "All storage tiers failed, value kept in memory and will be lost on restart"
            );
            // MemoryBackend::set cannot fail
            let _ = self.memory.set(key, raw).await;
            written.push(Tier::Memory);
        } else if let Err(e) = self.memory.remove(key).await {
            tracing::debug!(key = %key, error = %e, "Failed to drop memory copy");
        }

        (written, failed)
    }

    async fn read_freshest(&self, key: &str) -> Option<Envelope> {
        let mut best: Option<(Envelope, Tier)> = None;

        for backend in self.chain() {
            let raw = match backend.get(key).await {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(key = %key, tier = %backend.tier(), error = %e, "Storage tier read failed");
                    continue;
                }
            };

            match Envelope::decode(&raw) {
                Ok(envelope) => {
                    let newer = best
                        .as_ref()
                        .map(|(b, _)| envelope.stamp > b.stamp)
                        .unwrap_or(true);
                    if newer {
                        best = Some((envelope, backend.tier()));
                    }
                }
                Err(e) => {
                    tracing::warn!(key = %key, tier = %backend.tier(), error = %e, "Undecodable stored value")
                }
            }
        }

        best.map(|(envelope, tier)| {
            tracing::trace!(key = %key, tier = %tier, stamp = envelope.stamp, "Read value");
            // Stamps from a previous run must not be overtaken by new writes
            self.last_stamp.fetch_max(envelope.stamp, Ordering::SeqCst);
            envelope
        })
    }

    /// Backup storage keys of `key` across all tiers, oldest first
    async fn backup_keys(&self, key: &str) -> Vec<(u64, String)> {
        let prefix = format!("{}{}", key, BACKUP_MARKER);
        let mut found = BTreeMap::new();

        for backend in self.chain() {
            match backend.keys().await {
                Ok(keys) => {
                    for storage_key in keys.into_iter().filter(|k| k.starts_with(&prefix)) {
                        if let Some((owner, stamp)) = parse_backup_key(&storage_key) {
                            if owner == key {
                                found.insert(stamp, storage_key);
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(key = %key, tier = %backend.tier(), error = %e, "Failed to list backups")
                }
            }
        }

        found.into_iter().collect()
    }

    /// First copy of a backup that decodes and verifies
    async fn load_backup(&self, storage_key: &str) -> Option<BackupEntry> {
        for backend in self.chain() {
            let Ok(Some(raw)) = backend.get(storage_key).await else {
                continue;
            };
            match BackupEntry::decode(&raw).and_then(|entry| entry.verify().map(|_| entry)) {
                Ok(entry) => return Some(entry),
                Err(e) => {
                    tracing::warn!(backup = %storage_key, tier = %backend.tier(), error = %e, "Skipping corrupt backup")
                }
            }
        }
        None
    }

    async fn prune_backups(&self, key: &str) -> usize {
        let backups = self.backup_keys(key).await;
        let excess = backups.len().saturating_sub(self.config.max_backups);

        for (_, storage_key) in backups.iter().take(excess) {
            self.remove_everywhere(storage_key).await;
        }
        excess
    }

    async fn remove_everywhere(&self, storage_key: &str) {
        for backend in self.chain() {
            if let Err(e) = backend.remove(storage_key).await {
                tracing::warn!(key = %storage_key, tier = %backend.tier(), error = %e, "Storage tier remove failed");
            }
        }
    }
}

fn validate_key(key: &str) -> VaultResult<()> {
    if key.trim().is_empty() || key.contains(BACKUP_MARKER) || key.len() > MAX_KEY_BYTES {
        return Err(VaultError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Statistics for one tier
#[derive(Debug, Clone, Serialize)]
pub struct TierStats {
    pub tier: Tier,
    pub available: bool,
    pub keys: usize,
    pub backups: usize,
}

/// Vault statistics
#[derive(Debug, Clone, Serialize)]
pub struct VaultStats {
    pub tiers: Vec<TierStats>,
}

impl std::fmt::Display for VaultStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .tiers
            .iter()
            .map(|t| {
                if t.available {
                    format!("{}: {} keys, {} backups", t.tier, t.keys, t.backups)
                } else {
                    format!("{}: unavailable", t.tier)
                }
            })
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// In-memory tier that can be switched into a failing state
    struct FlakyBackend {
        tier: Tier,
        entries: Mutex<HashMap<String, String>>,
        failing: AtomicBool,
    }

    impl FlakyBackend {
        fn new(tier: Tier) -> Arc<Self> {
            Arc::new(Self {
                tier,
                entries: Mutex::new(HashMap::new()),
                failing: AtomicBool::new(false),
            })
        }

        fn failing(tier: Tier) -> Arc<Self> {
            let backend = Self::new(tier);
            backend.set_failing(true);
            backend
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn check(&self) -> VaultResult<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(VaultError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "simulated failure",
                )));
            }
            Ok(())
        }

        fn raw(&self, key: &str) -> Option<String> {
            self.entries.lock().unwrap().get(key).cloned()
        }

        fn put_raw(&self, key: &str, value: &str) {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
        }

        fn delete_raw(&self, key: &str) {
            self.entries.lock().unwrap().remove(key);
        }
    }

    #[async_trait]
    impl StorageBackend for FlakyBackend {
        fn tier(&self) -> Tier {
            self.tier
        }

        async fn get(&self, key: &str) -> VaultResult<Option<String>> {
            self.check()?;
            Ok(self.raw(key))
        }

        async fn set(&self, key: &str, value: &str) -> VaultResult<()> {
            self.check()?;
            self.put_raw(key, value);
            Ok(())
        }

        async fn remove(&self, key: &str) -> VaultResult<bool> {
            self.check()?;
            Ok(self.entries.lock().unwrap().remove(key).is_some())
        }

        async fn keys(&self) -> VaultResult<Vec<String>> {
            self.check()?;
            Ok(self.entries.lock().unwrap().keys().cloned().collect())
        }
    }

    fn chain(backends: Vec<Arc<FlakyBackend>>) -> Vec<Arc<dyn StorageBackend>> {
        backends
            .into_iter()
            .map(|b| b as Arc<dyn StorageBackend>)
            .collect()
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Company {
        name: String,
    }

    fn acme() -> Company {
        Company {
            name: "Acme".to_string(),
        }
    }

    fn test_config() -> VaultConfig {
        VaultConfig {
            critical_keys: vec!["company".to_string()],
            ..VaultConfig::new("unused")
        }
    }

    #[tokio::test]
    async fn test_open_real_tiers_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FallbackStore::open(VaultConfig::new(dir.path())).await;

        let outcome = store.save("company", &acme()).await.unwrap();
        assert_eq!(outcome.written, vec![Tier::Local, Tier::Session, Tier::Indexed]);
        assert!(outcome.failed.is_empty());
        assert!(!outcome.is_degraded());

        assert_eq!(store.get::<Company>("company").await, Some(acme()));
        assert!(store.has_persistent_tier());
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();

        {
            let store = FallbackStore::open(VaultConfig::new(dir.path())).await;
            store.save("company", &acme()).await.unwrap();
        }

        let store = FallbackStore::open(VaultConfig::new(dir.path())).await;
        assert_eq!(store.get::<Company>("company").await, Some(acme()));
    }

    #[tokio::test]
    async fn test_local_failure_falls_through_to_session() {
        let local = FlakyBackend::failing(Tier::Local);
        let session = FlakyBackend::new(Tier::Session);
        let store = FallbackStore::with_backends(chain(vec![local.clone(), session.clone()]), test_config());

        let outcome = store.save("company", &json!({"name": "Acme"})).await.unwrap();

        assert_eq!(outcome.written, vec![Tier::Session]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, Tier::Local);
        assert!(outcome.failed[0].1.contains("simulated failure"));

        let value: Value = store.get("company").await.unwrap();
        assert_eq!(value, json!({"name": "Acme"}));
    }

    #[tokio::test]
    async fn test_total_failure_degrades_to_memory() {
        let local = FlakyBackend::failing(Tier::Local);
        let indexed = FlakyBackend::failing(Tier::Indexed);
        let store = FallbackStore::with_backends(chain(vec![local, indexed]), test_config());

        let outcome = store.save("draft", &json!([1, 2, 3])).await.unwrap();
        assert!(outcome.is_degraded());
        assert_eq!(outcome.written, vec![Tier::Memory]);
        assert_eq!(outcome.failed.len(), 2);

        assert_eq!(store.get::<Vec<i32>>("draft").await, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_get_or_default_when_missing() {
        let store = FallbackStore::with_backends(chain(vec![FlakyBackend::new(Tier::Local)]), test_config());
        let value = store.get_or("missing", vec!["default".to_string()]).await;
        assert_eq!(value, vec!["default".to_string()]);

        let failing = FallbackStore::with_backends(chain(vec![FlakyBackend::failing(Tier::Local)]), test_config());
        assert_eq!(failing.get_or("missing", 7u32).await, 7);
    }

    #[tokio::test]
    async fn test_freshest_copy_wins() {
        let local = FlakyBackend::new(Tier::Local);
        let indexed = FlakyBackend::new(Tier::Indexed);
        let store = FallbackStore::with_backends(chain(vec![local.clone(), indexed.clone()]), test_config());

        store.save("counter", &1).await.unwrap();

        // Local misses the second write and keeps the stale value
        local.set_failing(true);
        store.save("counter", &2).await.unwrap();
        local.set_failing(false);

        assert!(local.raw("counter").unwrap().contains("\"data\":1"));
        assert_eq!(store.get::<i32>("counter").await, Some(2));
    }

    #[tokio::test]
    async fn test_successful_write_clears_memory_copy() {
        let local = FlakyBackend::failing(Tier::Local);
        let store = FallbackStore::with_backends(chain(vec![local.clone()]), test_config());

        store.save("k", &"memory").await.unwrap();
        local.set_failing(false);
        store.save("k", &"disk").await.unwrap();

        assert_eq!(store.memory.len().await, 0);
        assert_eq!(store.get::<String>("k").await.as_deref(), Some("disk"));
    }

    #[tokio::test]
    async fn test_backup_pruning_keeps_three_newest() {
        let local = FlakyBackend::new(Tier::Local);
        let store = FallbackStore::with_backends(chain(vec![local.clone()]), test_config());

        let mut stamps = Vec::new();
        for i in 0..5 {
            store.save("ledger", &i).await.unwrap();
            stamps.push(store.backup("ledger").await.unwrap().stamp);
        }

        let backups = store.backups("ledger").await;
        assert_eq!(backups.len(), 3);
        let kept: Vec<u64> = backups.iter().map(|b| b.stamp).collect();
        assert_eq!(kept, vec![stamps[4], stamps[3], stamps[2]]);
        assert_eq!(backups[0].data, json!(4));
    }

    #[tokio::test]
    async fn test_backup_on_write_for_critical_keys_only() {
        let local = FlakyBackend::new(Tier::Local);
        let store = FallbackStore::with_backends(chain(vec![local.clone()]), test_config());

        store.save("company", &acme()).await.unwrap();
        store.save("scratch", &acme()).await.unwrap();

        assert_eq!(store.backups("company").await.len(), 1);
        assert!(store.backups("scratch").await.is_empty());
    }

    #[tokio::test]
    async fn test_backup_missing_key() {
        let store = FallbackStore::with_backends(chain(vec![FlakyBackend::new(Tier::Local)]), test_config());
        assert!(matches!(
            store.backup("nothing").await,
            Err(VaultError::KeyNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_restore_skips_corrupt_backup() {
        let local = FlakyBackend::new(Tier::Local);
        let store = FallbackStore::with_backends(chain(vec![local.clone()]), test_config());

        store.save("company", &acme()).await.unwrap();
        let good = store.backups("company").await.remove(0);

        // Newer backup with a checksum that does not match its data
        let mut bad = BackupEntry::new("company", good.stamp + 10, json!({"name": "Acme"})).unwrap();
        bad.data = json!({"name": "Tampered"});
        local.put_raw(&bad.storage_key(), &bad.encode().unwrap());

        local.delete_raw("company");
        let restored = store.restore("company").await.unwrap();
        assert_eq!(restored.stamp, good.stamp);
        assert_eq!(store.get::<Company>("company").await, Some(acme()));
    }

    #[tokio::test]
    async fn test_restore_missing_critical() {
        let local = FlakyBackend::new(Tier::Local);
        let store = FallbackStore::with_backends(chain(vec![local.clone()]), test_config());

        store.save("company", &acme()).await.unwrap();
        local.delete_raw("company");
        assert_eq!(store.get::<Company>("company").await, None);

        assert_eq!(store.restore_missing_critical().await, 1);
        assert_eq!(store.get::<Company>("company").await, Some(acme()));

        // Nothing left to restore
        assert_eq!(store.restore_missing_critical().await, 0);
    }

    #[tokio::test]
    async fn test_remove_clears_value_and_backups() {
        let local = FlakyBackend::new(Tier::Local);
        let store = FallbackStore::with_backends(chain(vec![local.clone()]), test_config());

        store.save("company", &acme()).await.unwrap();
        assert!(store.remove("company").await.unwrap());
        assert_eq!(store.get::<Company>("company").await, None);
        assert!(store.backups("company").await.is_empty());
        assert_eq!(store.restore_missing_critical().await, 0);
        assert!(!store.remove("company").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_keys_rejected() {
        let store = FallbackStore::with_backends(chain(vec![FlakyBackend::new(Tier::Local)]), test_config());
        assert!(matches!(store.save("", &1).await, Err(VaultError::InvalidKey(_))));
        assert!(matches!(
            store.save("company__backup_1", &1).await,
            Err(VaultError::InvalidKey(_))
        ));
        assert!(matches!(
            store.save(&"k".repeat(MAX_KEY_BYTES + 1), &1).await,
            Err(VaultError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_longest_key_reaches_every_directory_tier() {
        let dir = tempdir().unwrap();
        let key = "k".repeat(MAX_KEY_BYTES);
        let mut config = VaultConfig::new(dir.path());
        config.critical_keys = vec![key.clone()];

        let store = FallbackStore::open(config).await;
        let outcome = store.save(&key, &1).await.unwrap();
        assert_eq!(outcome.written, vec![Tier::Local, Tier::Session, Tier::Indexed]);
        assert!(outcome.failed.is_empty());

        // backup-on-write copy landed in all three tiers too
        for tier in store.stats().await.tiers {
            if tier.tier != Tier::Memory {
                assert_eq!((tier.keys, tier.backups), (1, 1), "{}", tier.tier);
            }
        }
    }

    #[tokio::test]
    async fn test_indexed_open_failure_leaves_other_tiers() {
        let dir = tempdir().unwrap();
        let config = VaultConfig::new(dir.path());
        // A directory where the database file should be
        std::fs::create_dir_all(config.indexed_path()).unwrap();

        let store = FallbackStore::open(config).await;
        let outcome = store.save("company", &acme()).await.unwrap();
        assert_eq!(outcome.written, vec![Tier::Local, Tier::Session]);
        assert!(store.has_persistent_tier());

        let indexed = store
            .stats()
            .await
            .tiers
            .into_iter()
            .find(|t| t.tier == Tier::Indexed)
            .unwrap();
        assert!(!indexed.available);
    }

    #[tokio::test]
    async fn test_events_published() {
        let store = FallbackStore::with_backends(chain(vec![FlakyBackend::new(Tier::Local)]), test_config());
        let mut rx = store.subscribe();

        store.save("scratch", &1).await.unwrap();
        store.remove("scratch").await.unwrap();

        let saved = rx.recv().await.unwrap();
        assert_eq!(saved.key, "scratch");
        assert_eq!(saved.kind, StorageEventKind::Saved);
        let removed = rx.recv().await.unwrap();
        assert_eq!(removed.kind, StorageEventKind::Removed);
    }

    #[tokio::test]
    async fn test_shutdown_takes_final_backup() {
        let local = FlakyBackend::new(Tier::Local);
        let config = VaultConfig {
            backup_on_write: false,
            ..test_config()
        };
        let store = Arc::new(FallbackStore::with_backends(chain(vec![local.clone()]), config));
        let handle = store.start_background_backup();

        store.save("company", &acme()).await.unwrap();
        assert!(store.backups("company").await.is_empty());

        assert_eq!(store.shutdown().await, 1);
        assert_eq!(store.backups("company").await.len(), 1);
        handle.abort();
    }

    #[tokio::test]
    async fn test_stats_and_keys() {
        let local = FlakyBackend::new(Tier::Local);
        let store = FallbackStore::with_backends(chain(vec![local.clone()]), test_config());

        store.save("company", &acme()).await.unwrap();
        store.save("scratch", &1).await.unwrap();

        assert_eq!(store.keys().await, vec!["company".to_string(), "scratch".to_string()]);

        let stats = store.stats().await;
        let local_stats = stats.tiers.iter().find(|t| t.tier == Tier::Local).unwrap();
        assert_eq!(local_stats.keys, 2);
        assert_eq!(local_stats.backups, 1);
        assert!(stats.to_string().contains("local: 2 keys, 1 backups"));
    }
}
