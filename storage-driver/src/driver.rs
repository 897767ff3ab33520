use std::{fmt, ops::Deref, sync::Arc};

use camino::Utf8Path;
use chrono::{DateTime, Utc};
use tokio::io::{self, AsyncWriteExt};

use crate::error::StorageError;
use crate::location::{Location, LocationRequest};

/// A reader stream for object contents.
pub type Reader<'r> = dyn io::AsyncBufRead + Unpin + Send + Sync + 'r;

/// A writer stream for object contents.
pub type Writer<'w> = dyn io::AsyncWrite + Unpin + Send + Sync + 'w;

/// Object metadata, generically provided by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Metadata {
    /// The size of the object in bytes.
    pub size: u64,

    /// When the object was written.
    pub created: DateTime<Utc>,
}

/// A storage driver, which provides the ability to interact with a storage backend.
///
/// Drivers must commit writes atomically: an upload which fails, or whose
/// future is dropped before it completes, leaves either the previous object
/// or nothing at the destination path, never a partial object.
#[async_trait::async_trait]
pub trait Driver: fmt::Debug {
    /// The name of the driver.
    fn name(&self) -> &'static str;

    /// Delete an object, by path.
    ///
    /// Deleting a missing object is a `NotFound` error.
    async fn delete(&self, bucket: &str, remote: &Utf8Path) -> Result<(), StorageError>;

    /// Get the metadata for an object, by path.
    async fn metadata(&self, bucket: &str, remote: &Utf8Path) -> Result<Metadata, StorageError>;

    /// Check whether an object exists.
    async fn exists(&self, bucket: &str, remote: &Utf8Path) -> Result<bool, StorageError> {
        match self.metadata(bucket, remote).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Open an object for streaming reads.
    async fn open(
        &self,
        bucket: &str,
        remote: &Utf8Path,
    ) -> Result<Box<Reader<'static>>, StorageError>;

    /// Upload an object, using a reader stream to provide the contents.
    ///
    /// The object is committed only once `reader` reaches EOF without error.
    async fn upload(
        &self,
        bucket: &str,
        remote: &Utf8Path,
        reader: &mut Reader<'_>,
    ) -> Result<(), StorageError>;

    /// Download an object into a writer stream.
    async fn download(
        &self,
        bucket: &str,
        remote: &Utf8Path,
        writer: &mut Writer<'_>,
    ) -> Result<(), StorageError> {
        let mut reader = self.open(bucket, remote).await?;
        io::copy_buf(&mut reader, writer)
            .await
            .map_err(|err| StorageError::io(self.name(), err).with_path(remote.as_str()))?;
        writer
            .flush()
            .await
            .map_err(|err| StorageError::io(self.name(), err).with_path(remote.as_str()))?;
        Ok(())
    }

    /// List the objects in a bucket, optionally filtered by a path prefix.
    ///
    /// Returned paths are relative to the bucket. A prefix which matches
    /// nothing yields an empty list.
    async fn list(
        &self,
        bucket: &str,
        prefix: Option<&Utf8Path>,
    ) -> Result<Vec<String>, StorageError>;

    /// Negotiate a location for transferring an object directly, bypassing
    /// this driver.
    ///
    /// `None` means direct transfer is not possible, and the bytes must be
    /// streamed through the driver instead.
    async fn location(
        &self,
        bucket: &str,
        remote: &Utf8Path,
        request: LocationRequest<'_>,
    ) -> Result<Option<Location>, StorageError> {
        tracing::trace!(driver = self.name(), %bucket, %remote, purpose = %request.purpose, "no direct transfer support");
        Ok(None)
    }
}

#[async_trait::async_trait]
impl<D> Driver for Arc<D>
where
    D: ?Sized + Driver + Sync + Send + 'static,
{
    fn name(&self) -> &'static str {
        self.deref().name()
    }

    async fn delete(&self, bucket: &str, remote: &Utf8Path) -> Result<(), StorageError> {
        self.deref().delete(bucket, remote).await
    }

    async fn metadata(&self, bucket: &str, remote: &Utf8Path) -> Result<Metadata, StorageError> {
        self.deref().metadata(bucket, remote).await
    }

    async fn exists(&self, bucket: &str, remote: &Utf8Path) -> Result<bool, StorageError> {
        self.deref().exists(bucket, remote).await
    }

    async fn open(
        &self,
        bucket: &str,
        remote: &Utf8Path,
    ) -> Result<Box<Reader<'static>>, StorageError> {
        self.deref().open(bucket, remote).await
    }

    async fn upload(
        &self,
        bucket: &str,
        remote: &Utf8Path,
        reader: &mut Reader<'_>,
    ) -> Result<(), StorageError> {
        self.deref().upload(bucket, remote, reader).await
    }

    async fn download(
        &self,
        bucket: &str,
        remote: &Utf8Path,
        writer: &mut Writer<'_>,
    ) -> Result<(), StorageError> {
        self.deref().download(bucket, remote, writer).await
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: Option<&Utf8Path>,
    ) -> Result<Vec<String>, StorageError> {
        self.deref().list(bucket, prefix).await
    }

    async fn location(
        &self,
        bucket: &str,
        remote: &Utf8Path,
        request: LocationRequest<'_>,
    ) -> Result<Option<Location>, StorageError> {
        self.deref().location(bucket, remote, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_obj_safe!(Driver);
}
