//! # Storage backends
//!
//! Configuration and unification for the storage backends.

use std::collections::BTreeMap;
use std::sync::Arc;

use camino::Utf8Path;
#[cfg(feature = "local")]
use camino::Utf8PathBuf;
use serde::Deserialize;
use tokio::io;

#[cfg(feature = "local")]
pub(crate) mod local;
pub(crate) mod memory;
pub mod redirect;

#[cfg(feature = "local")]
#[doc(inline)]
pub use local::LocalDriver;

#[doc(inline)]
pub use memory::MemoryStorage;

#[doc(inline)]
pub use redirect::{Redirect, RedirectConfig};

#[doc(inline)]
pub use storage_driver::{
    Driver, Location, LocationRequest, Metadata, Purpose, Reader, StorageError, StorageErrorKind,
};

/// Selects and configures a storage driver.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageConfig {
    /// Keep everything in process memory.
    Memory,

    /// Store objects under a directory on the local filesystem.
    #[cfg(feature = "local")]
    Local {
        /// Root directory of the store.
        path: Utf8PathBuf,
    },
}

impl StorageConfig {
    /// Build the configured driver.
    #[tracing::instrument]
    pub async fn build(self) -> Result<Storage, StorageError> {
        let client: Storage = match self {
            StorageConfig::Memory => MemoryStorage::new().into(),
            #[cfg(feature = "local")]
            StorageConfig::Local { path } => {
                tokio::fs::create_dir_all(&path)
                    .await
                    .map_err(|err| StorageError::io("local", err).with_path(path.as_str()))?;
                LocalDriver::new(path).into()
            }
        };
        Ok(client)
    }
}

pub(crate) type ArcDriver = Arc<dyn Driver + Send + Sync>;

/// A shared handle to a storage driver.
#[derive(Debug, Clone)]
pub struct Storage {
    driver: ArcDriver,
}

impl<D> From<D> for Storage
where
    D: Driver + Send + Sync + 'static,
{
    fn from(value: D) -> Self {
        Storage::new(value)
    }
}

impl Storage {
    /// Wrap a driver.
    pub fn new<D: Driver + Send + Sync + 'static>(driver: D) -> Self {
        Self {
            driver: Arc::new(driver),
        }
    }

    /// The name of the underlying driver.
    pub fn name(&self) -> &str {
        self.driver.name()
    }

    /// A handle scoped to one bucket.
    pub fn bucket<S: Into<String>>(&self, bucket: S) -> StorageBucket {
        StorageBucket {
            driver: self.driver.clone(),
            bucket: bucket.into(),
        }
    }

    /// Grant direct-transfer locations under `config.base` for every object
    /// in this storage.
    pub fn with_redirect(self, config: RedirectConfig) -> Self {
        Storage::new(Redirect::new(self.driver, config))
    }
}

/// A storage handle bound to a single bucket.
#[derive(Debug, Clone)]
pub struct StorageBucket {
    bucket: String,
    driver: ArcDriver,
}

impl StorageBucket {
    /// The bucket name.
    pub fn name(&self) -> &str {
        &self.bucket
    }

    /// The name of the underlying driver.
    pub fn driver_name(&self) -> &'static str {
        self.driver.name()
    }

    /// Object metadata.
    #[tracing::instrument(level = "trace", skip(self), fields(driver=self.driver.name(), bucket=self.bucket))]
    pub async fn metadata(&self, remote: &Utf8Path) -> Result<Metadata, StorageError> {
        self.driver.metadata(&self.bucket, remote).await
    }

    /// Whether an object exists.
    #[tracing::instrument(level = "trace", skip(self), fields(driver=self.driver.name(), bucket=self.bucket))]
    pub async fn exists(&self, remote: &Utf8Path) -> Result<bool, StorageError> {
        self.driver.exists(&self.bucket, remote).await
    }

    /// Open an object for streaming reads.
    #[tracing::instrument(level = "trace", skip(self), fields(driver=self.driver.name(), bucket=self.bucket))]
    pub async fn open(&self, remote: &Utf8Path) -> Result<Box<Reader<'static>>, StorageError> {
        self.driver.open(&self.bucket, remote).await
    }

    /// Read a whole object into memory.
    ///
    /// Only meant for small documents such as manifests and indices.
    pub async fn read(&self, remote: &Utf8Path) -> Result<Vec<u8>, StorageError> {
        let mut buf = Vec::new();
        self.download(remote, &mut buf).await?;
        Ok(buf)
    }

    /// Download an object into a writer.
    #[tracing::instrument(level = "trace", skip(self, writer), fields(driver=self.driver.name(), bucket=self.bucket))]
    pub async fn download<'d, W>(
        &'d self,
        remote: &Utf8Path,
        writer: &mut W,
    ) -> Result<(), StorageError>
    where
        W: io::AsyncWrite + Unpin + Send + Sync + 'd,
    {
        tracing::trace!(%remote, "Downloading from: {}/{remote}", self.bucket);
        self.driver.download(&self.bucket, remote, writer).await
    }

    /// Upload an object from a reader.
    #[tracing::instrument(level = "trace", skip(self, reader), fields(driver=self.driver.name(), bucket=self.bucket))]
    pub async fn upload<'d, R>(
        &'d self,
        remote: &Utf8Path,
        reader: &mut R,
    ) -> Result<(), StorageError>
    where
        R: io::AsyncBufRead + Unpin + Send + Sync + 'd,
    {
        tracing::trace!(%remote, "Uploading to: {}/{remote}", self.bucket);
        self.driver.upload(&self.bucket, remote, reader).await
    }

    /// Write a small in-memory document.
    pub async fn write(&self, remote: &Utf8Path, content: &[u8]) -> Result<(), StorageError> {
        let mut reader = content;
        self.upload(remote, &mut reader).await
    }

    /// List object paths under `prefix`.
    #[tracing::instrument(level = "trace", skip(self), fields(driver=self.driver.name(), bucket=self.bucket))]
    pub async fn list(&self, prefix: Option<&Utf8Path>) -> Result<Vec<String>, StorageError> {
        self.driver.list(&self.bucket, prefix).await
    }

    /// Delete an object.
    #[tracing::instrument(level = "trace", skip(self), fields(driver=self.driver.name(), bucket=self.bucket))]
    pub async fn delete(&self, path: &Utf8Path) -> Result<(), StorageError> {
        self.driver.delete(&self.bucket, path).await
    }

    /// Negotiate a direct-transfer location for an object.
    #[tracing::instrument(level = "trace", skip(self, properties), fields(driver=self.driver.name(), bucket=self.bucket))]
    pub async fn location(
        &self,
        remote: &Utf8Path,
        purpose: Purpose,
        properties: &BTreeMap<String, String>,
    ) -> Result<Option<Location>, StorageError> {
        self.driver
            .location(&self.bucket, remote, LocationRequest::new(purpose, properties))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bucket_handles_share_a_driver() {
        let storage: Storage = MemoryStorage::new().into();
        let a = storage.bucket("a");
        let b = storage.bucket("b");

        a.write("x/doc.json".into(), b"{}").await.unwrap();
        assert!(a.exists("x/doc.json".into()).await.unwrap());
        assert!(!b.exists("x/doc.json".into()).await.unwrap());
        assert_eq!(a.read("x/doc.json".into()).await.unwrap(), b"{}");
    }

    #[tokio::test]
    async fn plain_drivers_do_not_redirect() {
        let storage: Storage = MemoryStorage::new().into();
        let location = storage
            .bucket("a")
            .location("x".into(), Purpose::Download, &BTreeMap::new())
            .await
            .unwrap();
        assert!(location.is_none());

        let storage = storage.with_redirect(RedirectConfig::new(http::Uri::from_static(
            "https://objects.example.test",
        )));
        let location = storage
            .bucket("a")
            .location("x".into(), Purpose::Download, &BTreeMap::new())
            .await
            .unwrap();
        assert!(location.is_some());
    }

    #[test]
    fn config_variants() {
        let config: StorageConfig = serde_json::from_str(r#""memory""#).unwrap();
        assert!(matches!(config, StorageConfig::Memory));

        let config: StorageConfig =
            serde_json::from_str(r#"{"local": {"path": "/var/lib/registry"}}"#).unwrap();
        assert!(
            matches!(config, StorageConfig::Local { ref path } if path == "/var/lib/registry")
        );
    }
}
