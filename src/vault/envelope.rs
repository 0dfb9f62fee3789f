//! Stored value formats
//!
//! Live values are wrapped in an [`Envelope`] carrying the write stamp so the
//! freshest copy wins when tiers disagree. Backups are [`BackupEntry`]s stored
//! under derived keys and protected by a CRC32 of their payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{VaultError, VaultResult};

/// Separator between a key and its backup stamp
pub const BACKUP_MARKER: &str = "__backup_";

/// A live value as stored in every tier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    /// Microsecond write stamp, strictly increasing per store
    pub stamp: u64,
    pub data: Value,
}

impl Envelope {
    pub fn new(stamp: u64, data: Value) -> Self {
        Self { stamp, data }
    }

    pub fn encode(&self) -> VaultResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> VaultResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// A timestamped copy of a key's value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupEntry {
    pub key: String,
    pub stamp: u64,
    /// CRC32 of the compact JSON encoding of `data`
    pub checksum: u32,
    pub data: Value,
}

impl BackupEntry {
    pub fn new(key: impl Into<String>, stamp: u64, data: Value) -> VaultResult<Self> {
        let checksum = checksum_of(&data)?;
        Ok(Self {
            key: key.into(),
            stamp,
            checksum,
            data,
        })
    }

    /// Storage key this backup lives under
    pub fn storage_key(&self) -> String {
        backup_key(&self.key, self.stamp)
    }

    /// Recompute the checksum and compare
    pub fn verify(&self) -> VaultResult<()> {
        let actual = checksum_of(&self.data)?;
        if actual != self.checksum {
            return Err(VaultError::CorruptBackup {
                key: self.key.clone(),
                reason: format!("checksum {:08x} != {:08x}", actual, self.checksum),
            });
        }
        Ok(())
    }

    pub fn encode(&self) -> VaultResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> VaultResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

fn checksum_of(data: &Value) -> VaultResult<u32> {
    let bytes = serde_json::to_vec(data)?;
    Ok(crc32fast::hash(&bytes))
}

/// Storage key for a backup of `key` taken at `stamp`
///
/// Stamps are zero-padded so lexical order matches chronological order.
pub fn backup_key(key: &str, stamp: u64) -> String {
    format!("{}{}{:020}", key, BACKUP_MARKER, stamp)
}

/// Split a backup storage key into `(key, stamp)`
pub fn parse_backup_key(storage_key: &str) -> Option<(&str, u64)> {
    let idx = storage_key.rfind(BACKUP_MARKER)?;
    let (key, rest) = storage_key.split_at(idx);
    let stamp = rest[BACKUP_MARKER.len()..].parse().ok()?;
    if key.is_empty() {
        return None;
    }
    Some((key, stamp))
}

/// Whether a storage key belongs to the backup namespace
pub fn is_backup_key(storage_key: &str) -> bool {
    parse_backup_key(storage_key).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_backup_key_parse() {
        let key = backup_key("company", 42);
        assert_eq!(key, "company__backup_00000000000000000042");
        assert_eq!(parse_backup_key(&key), Some(("company", 42)));
        assert!(is_backup_key(&key));

        assert!(!is_backup_key("company"));
        assert!(!is_backup_key("__backup_12"));
        assert!(!is_backup_key("company__backup_x"));
    }

    #[test]
    fn test_backup_keys_sort_chronologically() {
        let older = backup_key("k", 9);
        let newer = backup_key("k", 10);
        assert!(older < newer);
    }

    #[test]
    fn test_checksum_detects_tampering() {
        let mut entry = BackupEntry::new("company", 1, json!({"name": "Acme"})).unwrap();
        assert!(entry.verify().is_ok());

        entry.data = json!({"name": "Evil"});
        assert!(matches!(
            entry.verify(),
            Err(VaultError::CorruptBackup { .. })
        ));
    }

    #[test]
    fn test_envelope_decode_rejects_plain_values() {
        assert!(Envelope::decode(r#"{"name":"Acme"}"#).is_err());
        let env = Envelope::new(7, json!([1, 2]));
        assert_eq!(Envelope::decode(&env.encode().unwrap()).unwrap(), env);
    }
}
