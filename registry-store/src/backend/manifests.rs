use chrono::Utc;

use super::RegistryStorage;
use crate::digest::Digest;
use crate::error::{RegistryError, RegistryResult};
use crate::path::manifest_path;
use crate::reference::{validate_repository, Reference};
use crate::store::ManifestStore;
use crate::types::{Descriptor, Manifest};

#[async_trait::async_trait]
impl ManifestStore for RegistryStorage {
    #[tracing::instrument(skip(self))]
    async fn exists_manifest(&self, repository: &str, reference: &str) -> RegistryResult<bool> {
        validate_repository(repository)?;
        let reference = Reference::parse(reference)?;
        let path = manifest_path(repository, reference.as_str());
        Ok(self.bucket.exists(&path).await?)
    }

    #[tracing::instrument(skip(self))]
    async fn get_manifest(&self, repository: &str, reference: &str) -> RegistryResult<Manifest> {
        validate_repository(repository)?;
        let reference = Reference::parse(reference)?;
        let path = manifest_path(repository, reference.as_str());

        let body = self
            .bucket
            .read(&path)
            .await
            .map_err(RegistryError::manifest(repository, reference.as_str()))?;

        serde_json::from_slice(&body).map_err(|source| RegistryError::Corrupt {
            path: path.to_string(),
            source,
        })
    }

    #[tracing::instrument(skip(self, manifest))]
    async fn put_manifest(
        &self,
        repository: &str,
        reference: &str,
        content_type: &str,
        manifest: &Manifest,
    ) -> RegistryResult<()> {
        validate_repository(repository)?;
        let reference = Reference::parse(reference)?;
        let body = manifest.to_bytes()?;

        let digest = match &reference {
            Reference::Digest(expected) => {
                let actual = Digest::compute(expected.algorithm(), &body)?;
                if actual != *expected {
                    return Err(RegistryError::DigestMismatch {
                        expected: expected.clone(),
                        actual,
                    });
                }
                actual
            }
            Reference::Tag(_) => Digest::sha256(&body),
        };

        let path = manifest_path(repository, reference.as_str());
        let media_type = if content_type.is_empty() {
            manifest.media_type.clone()
        } else {
            content_type.to_owned()
        };
        let entry = Descriptor {
            name: reference.as_str().to_owned(),
            media_type,
            digest,
            size: body.len() as u64,
            modified: Some(Utc::now()),
            ..Default::default()
        };

        // Held across both writes so the index names the body that won.
        let _guard = self.index_lock.lock().await;
        tracing::trace!(%path, digest = %entry.digest, "writing manifest");
        self.bucket.write(&path, &body).await?;
        self.update_index_locked(repository, |index| index.upsert(entry))
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn delete_manifest(&self, repository: &str, reference: &str) -> RegistryResult<()> {
        validate_repository(repository)?;
        let reference = Reference::parse(reference)?;
        let path = manifest_path(repository, reference.as_str());

        let _guard = self.index_lock.lock().await;
        self.bucket
            .delete(&path)
            .await
            .map_err(RegistryError::manifest(repository, reference.as_str()))?;

        let name = reference.as_str();
        self.update_index_locked(repository, |index| {
            index.remove(name);
        })
        .await
    }
}
