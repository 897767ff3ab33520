//! Registry storage on top of a [`storage`] driver.
//!
//! Every object lives in one bucket, at the paths built by [`crate::path`].

use std::sync::Arc;

use camino::Utf8Path;
use chrono::Utc;
use storage::{Storage, StorageBucket};
use tokio::sync::Mutex;

use crate::digest::Digest;
use crate::error::{RegistryError, RegistryResult};
use crate::path::index_path;
use crate::types::{Descriptor, Index, MEDIA_TYPE_INDEX};

mod blobs;
mod index;
mod location;
mod manifests;

/// Name of the bucket used when none is configured.
pub const DEFAULT_BUCKET: &str = "registry";

/// A [`RegistryStore`](crate::RegistryStore) backed by a storage driver.
///
/// Cloning is cheap, and clones share the driver and the index lock.
#[derive(Debug, Clone)]
pub struct RegistryStorage {
    bucket: StorageBucket,

    // Serializes index read-modify-write cycles within this process, along
    // with the manifest writes they record.
    index_lock: Arc<Mutex<()>>,
}

impl RegistryStorage {
    /// Store everything in `bucket` of `storage`.
    pub fn new(storage: Storage, bucket: impl Into<String>) -> Self {
        Self::from_bucket(storage.bucket(bucket))
    }

    /// Store everything in an existing bucket handle.
    pub fn from_bucket(bucket: StorageBucket) -> Self {
        Self {
            bucket,
            index_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The bucket holding the registry.
    pub fn bucket(&self) -> &StorageBucket {
        &self.bucket
    }

    /// Read an index document, or `None` if there is none.
    async fn read_index(&self, path: &Utf8Path) -> RegistryResult<Option<Index>> {
        let body = match self.bucket.read(path).await {
            Ok(body) => body,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let mut index: Index =
            serde_json::from_slice(&body).map_err(|source| RegistryError::Corrupt {
                path: path.to_string(),
                source,
            })?;
        index.sort();
        Ok(Some(index))
    }

    async fn write_index(&self, path: &Utf8Path, index: &Index) -> RegistryResult<Vec<u8>> {
        let body = serde_json::to_vec(index)?;
        self.bucket.write(path, &body).await?;
        Ok(body)
    }

    /// Apply `update` to the index of `repository` and keep the global index
    /// in step with it. The caller holds the index lock.
    ///
    /// A repository index left empty is removed along with its global entry.
    #[tracing::instrument(level = "debug", skip(self, update))]
    async fn update_index_locked<F>(&self, repository: &str, update: F) -> RegistryResult<()>
    where
        F: FnOnce(&mut Index) + Send,
    {
        let path = index_path(repository);
        let mut index = self.read_index(&path).await?.unwrap_or_default();
        update(&mut index);

        if index.is_empty() {
            tracing::debug!(%path, "repository index is empty, removing");
            match self.bucket.delete(&path).await {
                Ok(()) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err.into()),
            }
            return self
                .update_global(|global| {
                    global.remove(repository);
                })
                .await;
        }

        let body = self.write_index(&path, &index).await?;
        let entry = Descriptor {
            name: repository.to_owned(),
            media_type: MEDIA_TYPE_INDEX.to_owned(),
            digest: Digest::sha256(&body),
            size: body.len() as u64,
            modified: Some(Utc::now()),
            ..Default::default()
        };
        self.update_global(|global| global.upsert(entry)).await
    }

    /// Apply `update` to the global index. The caller holds the index lock.
    async fn update_global<F>(&self, update: F) -> RegistryResult<()>
    where
        F: FnOnce(&mut Index) + Send,
    {
        let path = index_path("");
        let mut global = self.read_index(&path).await?.unwrap_or_default();
        update(&mut global);
        self.write_index(&path, &global).await?;
        Ok(())
    }
}
