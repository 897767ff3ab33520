//! The registry store capability traits.
//!
//! A backend implements [`BlobStore`], [`ManifestStore`], [`IndexStore`] and
//! [`LocationResolver`]; anything that does is a [`RegistryStore`]. Every
//! operation is an async fn, so dropping its future cancels it. Deadlines are
//! applied the same way, e.g. with `tokio::time::timeout`.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storage::{Purpose, Reader};
use tokio::io::AsyncReadExt;

use crate::digest::Digest;
use crate::error::RegistryResult;
use crate::types::{Index, Manifest, MEDIA_TYPE_OCTET_STREAM};

/// Size and type of a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobMeta {
    /// Media type of the blob.
    pub content_type: String,

    /// Size of the blob in bytes.
    pub content_length: u64,
}

/// A blob being streamed into or out of the store.
///
/// Dropping it releases the underlying stream, on every path.
pub struct BlobContent {
    /// Media type of the blob.
    pub content_type: String,

    /// Size of the blob in bytes, when known.
    ///
    /// For writes, a known length is checked against what was read.
    pub content_length: Option<u64>,

    /// The content.
    pub content: Box<Reader<'static>>,
}

impl fmt::Debug for BlobContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobContent")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

impl BlobContent {
    /// Stream `content` of unknown length.
    pub fn new(content: Box<Reader<'static>>) -> Self {
        Self {
            content_type: MEDIA_TYPE_OCTET_STREAM.to_owned(),
            content_length: None,
            content,
        }
    }

    /// Content already held in memory.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data: Bytes = data.into();
        Self {
            content_type: MEDIA_TYPE_OCTET_STREAM.to_owned(),
            content_length: Some(data.len() as u64),
            content: Box::new(std::io::Cursor::new(data)),
        }
    }

    /// Set the declared length.
    pub fn with_length(mut self, length: u64) -> Self {
        self.content_length = Some(length);
        self
    }

    /// The size and type, if the length is known.
    pub fn meta(&self) -> Option<BlobMeta> {
        self.content_length.map(|content_length| BlobMeta {
            content_type: self.content_type.clone(),
            content_length,
        })
    }

    /// Read the whole blob into memory.
    pub async fn into_bytes(mut self) -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.content_length.unwrap_or_default() as usize);
        self.content.read_to_end(&mut buf).await?;
        Ok(buf)
    }
}

/// Where to transfer a blob directly, bypassing the store.
///
/// Only valid for the request that produced it. A location for an upload says
/// nothing about whether the upload will happen; confirm with
/// [`BlobStore::exists_blob`] afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobLocation {
    /// Name of the backend which granted the location.
    pub provider: String,

    /// Direction of the transfer.
    pub purpose: Purpose,

    /// Target URL.
    pub url: String,

    /// HTTP method to use against `url`.
    pub method: String,

    /// When the location stops being valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,

    /// Headers to send with the transfer.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Parameters the backend settled on.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

/// Immutable, content-addressed binary objects.
#[async_trait::async_trait]
pub trait BlobStore: fmt::Debug + Send + Sync {
    /// Digests of every blob in `repository`, sorted.
    async fn list_blobs(&self, repository: &str) -> RegistryResult<Vec<Digest>>;

    /// Whether the blob exists. A missing blob is `Ok(false)`, not an error.
    async fn exists_blob(&self, repository: &str, digest: &Digest) -> RegistryResult<bool>;

    /// Size and type of a blob. The empty digest is never found.
    async fn get_blob_meta(&self, repository: &str, digest: &Digest) -> RegistryResult<BlobMeta>;

    /// Open a blob for streaming.
    async fn get_blob(&self, repository: &str, digest: &Digest) -> RegistryResult<BlobContent>;

    /// Store a blob under its digest.
    ///
    /// The content must hash to `digest`, otherwise nothing is stored. Storing
    /// a digest which already exists succeeds without reading `content`.
    async fn put_blob(
        &self,
        repository: &str,
        digest: &Digest,
        content: BlobContent,
    ) -> RegistryResult<()>;

    /// Delete a blob.
    async fn delete_blob(&self, repository: &str, digest: &Digest) -> RegistryResult<()>;
}

/// Manifests addressed by tag or digest.
#[async_trait::async_trait]
pub trait ManifestStore: fmt::Debug + Send + Sync {
    /// Whether a manifest exists under `reference`. A missing manifest is
    /// `Ok(false)`, not an error.
    async fn exists_manifest(&self, repository: &str, reference: &str) -> RegistryResult<bool>;

    /// Fetch the manifest under `reference`.
    async fn get_manifest(&self, repository: &str, reference: &str) -> RegistryResult<Manifest>;

    /// Store a manifest under `reference`.
    ///
    /// Under a tag this replaces whatever was there. Under a digest the
    /// serialized manifest must hash to that digest.
    ///
    /// `content_type` is recorded only in the repository index entry, falling
    /// back to the manifest's `media_type` when empty. The stored document
    /// keeps its own `media_type`, which is what [`get_manifest`] returns.
    ///
    /// [`get_manifest`]: ManifestStore::get_manifest
    async fn put_manifest(
        &self,
        repository: &str,
        reference: &str,
        content_type: &str,
        manifest: &Manifest,
    ) -> RegistryResult<()>;

    /// Delete the manifest under `reference`. Blobs it refers to are kept.
    async fn delete_manifest(&self, repository: &str, reference: &str) -> RegistryResult<()>;
}

/// Searchable indices over repositories and their manifests.
#[async_trait::async_trait]
pub trait IndexStore: fmt::Debug + Send + Sync {
    /// The index of every repository, filtered by `search`.
    async fn get_global_index(&self, search: &str) -> RegistryResult<Index>;

    /// The index of one repository, filtered by `search`.
    async fn get_index(&self, repository: &str, search: &str) -> RegistryResult<Index>;

    /// Stop listing `repository`. Its manifests and blobs are kept.
    async fn remove_index(&self, repository: &str) -> RegistryResult<()>;
}

/// Negotiates direct-transfer locations for blobs.
#[async_trait::async_trait]
pub trait LocationResolver: fmt::Debug + Send + Sync {
    /// A location to upload or download a blob directly, or `None` when the
    /// bytes must go through [`BlobStore`].
    async fn get_blob_location(
        &self,
        repository: &str,
        digest: &Digest,
        purpose: Purpose,
        properties: &BTreeMap<String, String>,
    ) -> RegistryResult<Option<BlobLocation>>;
}

/// Everything an artifact registry server needs from its storage.
pub trait RegistryStore: BlobStore + ManifestStore + IndexStore + LocationResolver {}

impl<T> RegistryStore for T where T: BlobStore + ManifestStore + IndexStore + LocationResolver {}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_obj_safe!(RegistryStore);

    #[tokio::test]
    async fn blob_content_from_bytes() {
        let content = BlobContent::from_bytes(&b"hello"[..]);
        assert_eq!(
            content.meta(),
            Some(BlobMeta {
                content_type: MEDIA_TYPE_OCTET_STREAM.into(),
                content_length: 5
            })
        );
        assert_eq!(content.into_bytes().await.unwrap(), b"hello");
    }

    #[test]
    fn location_json() {
        let location = BlobLocation {
            provider: "memory".into(),
            purpose: Purpose::Upload,
            url: "https://objects.example.test/a".into(),
            method: "PUT".into(),
            expires: None,
            headers: BTreeMap::new(),
            properties: BTreeMap::new(),
        };
        let json = serde_json::to_value(&location).unwrap();
        assert_eq!(json["purpose"], "upload");
        assert!(json.get("expires").is_none());
    }
}
