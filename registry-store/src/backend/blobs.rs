use camino::Utf8Path;
use tokio::io::BufReader;

use super::RegistryStorage;
use crate::digest::{Digest, DigestError, Hasher};
use crate::error::{RegistryError, RegistryResult};
use crate::path::{blob_digest_path, blobs_path};
use crate::reference::validate_repository;
use crate::store::{BlobContent, BlobMeta, BlobStore};
use crate::types::MEDIA_TYPE_OCTET_STREAM;
use crate::verify::Verify;

#[async_trait::async_trait]
impl BlobStore for RegistryStorage {
    #[tracing::instrument(skip(self))]
    async fn list_blobs(&self, repository: &str) -> RegistryResult<Vec<Digest>> {
        validate_repository(repository)?;
        let prefix = blobs_path(repository);

        let mut digests: Vec<Digest> = self
            .bucket
            .list(Some(prefix.as_path()))
            .await?
            .iter()
            .filter_map(|path| {
                let (algorithm, hex) = Utf8Path::new(path)
                    .strip_prefix(&prefix)
                    .ok()?
                    .as_str()
                    .split_once('/')?;
                // Nested repositories live under the same prefix, but never
                // in a directory named after a supported algorithm.
                Hasher::new(algorithm).ok()?;
                Digest::parse(&format!("{algorithm}:{hex}")).ok()
            })
            .collect();
        digests.sort();
        digests.dedup();

        Ok(digests)
    }

    #[tracing::instrument(skip(self), fields(%digest))]
    async fn exists_blob(&self, repository: &str, digest: &Digest) -> RegistryResult<bool> {
        validate_repository(repository)?;
        let path = blob_digest_path(repository, digest);
        Ok(self.bucket.exists(&path).await?)
    }

    #[tracing::instrument(skip(self), fields(%digest))]
    async fn get_blob_meta(&self, repository: &str, digest: &Digest) -> RegistryResult<BlobMeta> {
        validate_repository(repository)?;
        if digest.is_empty() {
            return Err(not_found(repository, digest));
        }
        let path = blob_digest_path(repository, digest);
        let metadata = self
            .bucket
            .metadata(&path)
            .await
            .map_err(RegistryError::blob(repository, digest))?;

        Ok(BlobMeta {
            content_type: MEDIA_TYPE_OCTET_STREAM.to_owned(),
            content_length: metadata.size,
        })
    }

    #[tracing::instrument(skip(self), fields(%digest))]
    async fn get_blob(&self, repository: &str, digest: &Digest) -> RegistryResult<BlobContent> {
        let meta = self.get_blob_meta(repository, digest).await?;
        let path = blob_digest_path(repository, digest);
        let content = self
            .bucket
            .open(&path)
            .await
            .map_err(RegistryError::blob(repository, digest))?;

        Ok(BlobContent {
            content_type: meta.content_type,
            content_length: Some(meta.content_length),
            content,
        })
    }

    #[tracing::instrument(skip(self, content), fields(%digest, length = ?content.content_length))]
    async fn put_blob(
        &self,
        repository: &str,
        digest: &Digest,
        content: BlobContent,
    ) -> RegistryResult<()> {
        validate_repository(repository)?;
        if digest.is_empty() {
            return Err(DigestError::Empty.into());
        }

        let path = blob_digest_path(repository, digest);
        if self.bucket.exists(&path).await? {
            tracing::debug!(%path, "blob already stored, discarding content");
            return Ok(());
        }

        let verify = Verify::new(content.content, digest.clone(), content.content_length)?;
        let mut reader = BufReader::new(verify);

        match self.bucket.upload(&path, &mut reader).await {
            Ok(()) => Ok(()),
            Err(err) => match reader.get_ref().mismatch() {
                Some(mismatch) => Err(mismatch.clone().into()),
                None => Err(err.into()),
            },
        }
    }

    #[tracing::instrument(skip(self), fields(%digest))]
    async fn delete_blob(&self, repository: &str, digest: &Digest) -> RegistryResult<()> {
        validate_repository(repository)?;
        if digest.is_empty() {
            return Err(not_found(repository, digest));
        }
        let path = blob_digest_path(repository, digest);
        self.bucket
            .delete(&path)
            .await
            .map_err(RegistryError::blob(repository, digest))
    }
}

// The empty digest maps onto the blobs directory itself, which is never a blob.
fn not_found(repository: &str, digest: &Digest) -> RegistryError {
    RegistryError::BlobNotFound {
        repository: repository.to_owned(),
        digest: digest.clone(),
    }
}
