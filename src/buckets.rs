//! Object storage buckets
//!
//! Each bucket is a directory under the buckets root. Uploaded objects get a
//! generated name so two uploads of `receipt.pdf` never collide:
//! `{bucket}/{uuid}-{sanitized filename}`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_BUCKETS: [&str; 4] = [
    "bank-statements",
    "transaction-receipts",
    "employee-images",
    "company-logos",
];

#[derive(Error, Debug)]
pub enum BucketError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown bucket: {0}")]
    UnknownBucket(String),

    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object too large: {size} bytes (limit {limit})")]
    TooLarge { size: usize, limit: usize },
}

pub type BucketResult<T> = Result<T, BucketError>;

/// Listing entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectInfo {
    pub path: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

pub struct ObjectStore {
    root: PathBuf,
    buckets: Vec<String>,
    max_object_bytes: usize,
}

impl ObjectStore {
    /// Create the root and one directory per bucket
    pub async fn open(
        root: impl Into<PathBuf>,
        buckets: &[String],
        max_object_bytes: usize,
    ) -> BucketResult<Self> {
        let root = root.into();
        for bucket in buckets {
            tokio::fs::create_dir_all(root.join(bucket)).await?;
        }
        tracing::debug!(root = ?root, buckets = buckets.len(), "Object store ready");

        Ok(Self {
            root,
            buckets: buckets.to_vec(),
            max_object_bytes,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn buckets(&self) -> &[String] {
        &self.buckets
    }

    /// Store `bytes` and return the object path
    pub async fn upload(&self, bucket: &str, filename: &str, bytes: &[u8]) -> BucketResult<String> {
        self.check_bucket(bucket)?;
        if bytes.len() > self.max_object_bytes {
            return Err(BucketError::TooLarge {
                size: bytes.len(),
                limit: self.max_object_bytes,
            });
        }

        let name = format!("{}-{}", uuid::Uuid::new_v4(), sanitize_filename(filename));
        let object_path = format!("{}/{}", bucket, name);

        let file = self.root.join(bucket).join(&name);
        // Dot-prefixed while partial; stored names never start with a dot
        let tmp = self.root.join(bucket).join(format!(".{}.part", name));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &file).await?;

        tracing::info!(path = %object_path, size = bytes.len(), "Object uploaded");
        Ok(object_path)
    }

    pub async fn download(&self, path: &str) -> BucketResult<Vec<u8>> {
        let file = self.resolve(path)?;
        match tokio::fs::read(&file).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BucketError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn remove(&self, path: &str) -> BucketResult<bool> {
        let file = self.resolve(path)?;
        match tokio::fs::remove_file(&file).await {
            Ok(()) => {
                tracing::info!(path = %path, "Object removed");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Objects in a bucket, sorted by path
    pub async fn list(&self, bucket: &str) -> BucketResult<Vec<ObjectInfo>> {
        self.check_bucket(bucket)?;

        let mut objects = Vec::new();
        let mut entries = tokio::fs::read_dir(self.root.join(bucket)).await?;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            objects.push(ObjectInfo {
                path: format!("{}/{}", bucket, name),
                size: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        objects.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(objects)
    }

    fn check_bucket(&self, bucket: &str) -> BucketResult<()> {
        if self.buckets.iter().any(|b| b == bucket) {
            Ok(())
        } else {
            Err(BucketError::UnknownBucket(bucket.to_string()))
        }
    }

    /// Map an object path to a file, refusing anything outside its bucket
    fn resolve(&self, path: &str) -> BucketResult<PathBuf> {
        let (bucket, name) = path
            .split_once('/')
            .ok_or_else(|| BucketError::InvalidPath(path.to_string()))?;
        self.check_bucket(bucket)?;

        let unsafe_name = name.is_empty()
            || name.contains('/')
            || name.contains('\\')
            || name.starts_with('.')
            || name.contains("..");
        if unsafe_name {
            return Err(BucketError::InvalidPath(path.to_string()));
        }

        Ok(self.root.join(bucket).join(name))
    }
}

/// Keep ASCII alphanumerics, dot, dash and underscore
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').replace("..", "_");

    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Content type from the file extension
pub fn content_type(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "csv" => "text/csv",
        "txt" => "text/plain",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}
