use std::collections::HashMap;
use std::io::Cursor;

use bytes::Bytes;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use tokio::{io::AsyncReadExt, sync::RwLock};

use storage_driver::{Driver, Metadata, Reader, StorageError, StorageErrorKind};

#[derive(Debug, Clone)]
struct MemoryFileItem {
    created: DateTime<Utc>,
    data: Bytes,
}

impl From<Vec<u8>> for MemoryFileItem {
    fn from(data: Vec<u8>) -> Self {
        Self {
            created: Utc::now(),
            data: data.into(),
        }
    }
}

impl From<&MemoryFileItem> for Metadata {
    fn from(value: &MemoryFileItem) -> Self {
        Self {
            created: value.created,
            size: value.data.len() as u64,
        }
    }
}

type Bucket = HashMap<Utf8PathBuf, MemoryFileItem>;

/// Storage driver that stores objects in memory.
///
/// Buckets are created on first upload. Readers returned by `open` hold a
/// cheap clone of the object, so they stay valid if the object is replaced
/// or deleted while they are being read.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    buckets: RwLock<HashMap<String, Bucket>>,
}

impl MemoryStorage {
    /// Create a new `MemoryStorage` instance, with no buckets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new `MemoryStorage` instance, with the given buckets.
    pub fn with_buckets(buckets: &[&str]) -> Self {
        let mut map = HashMap::new();
        for bucket in buckets {
            map.insert(bucket.to_string(), HashMap::new());
        }

        Self {
            buckets: RwLock::new(map),
        }
    }

    async fn item(&self, bucket: &str, remote: &Utf8Path) -> Result<MemoryFileItem, StorageError> {
        let buckets = self.buckets.read().await;
        buckets
            .get(bucket)
            .and_then(|objects| objects.get(remote))
            .cloned()
            .ok_or_else(|| StorageError::not_found(self.name(), bucket, remote.as_str()))
    }
}

#[async_trait::async_trait]
impl Driver for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn metadata(&self, bucket: &str, remote: &Utf8Path) -> Result<Metadata, StorageError> {
        Ok((&self.item(bucket, remote).await?).into())
    }

    async fn delete(&self, bucket: &str, remote: &Utf8Path) -> Result<(), StorageError> {
        let mut buckets = self.buckets.write().await;
        buckets
            .get_mut(bucket)
            .and_then(|objects| objects.remove(remote))
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(self.name(), bucket, remote.as_str()))
    }

    async fn open(
        &self,
        bucket: &str,
        remote: &Utf8Path,
    ) -> Result<Box<Reader<'static>>, StorageError> {
        let item = self.item(bucket, remote).await?;
        Ok(Box::new(Cursor::new(item.data)))
    }

    async fn upload(
        &self,
        bucket: &str,
        remote: &Utf8Path,
        local: &mut Reader<'_>,
    ) -> Result<(), StorageError> {
        // The object is only inserted once the whole stream has been read.
        let mut buf = Vec::new();
        local.read_to_end(&mut buf).await.map_err(|err| {
            StorageError::builder(self.name(), StorageErrorKind::from_io(&err), err)
                .bucket(bucket)
                .path(remote.as_str())
                .context("reading upload")
                .build()
        })?;

        let mut buckets = self.buckets.write().await;
        let bucket_map = buckets.entry(bucket.to_string()).or_default();
        bucket_map.insert(remote.to_owned(), buf.into());

        Ok(())
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: Option<&Utf8Path>,
    ) -> Result<Vec<String>, StorageError> {
        tracing::trace!(%bucket, ?prefix, "list memory bucket");

        let buckets = self.buckets.read().await;
        let Some(bucket_map) = buckets.get(bucket) else {
            return Ok(Vec::new());
        };

        let mut paths: Vec<String> = bucket_map
            .keys()
            .filter(|path| prefix.is_none_or(|prefix| path.starts_with(prefix)))
            .map(|path| path.to_string())
            .collect();
        paths.sort();

        Ok(paths)
    }
}
