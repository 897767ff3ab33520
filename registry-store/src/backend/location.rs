use std::collections::BTreeMap;

use storage::Purpose;

use super::RegistryStorage;
use crate::digest::{Digest, DigestError};
use crate::error::{RegistryError, RegistryResult};
use crate::path::blob_digest_path;
use crate::reference::validate_repository;
use crate::store::{BlobLocation, LocationResolver};

#[async_trait::async_trait]
impl LocationResolver for RegistryStorage {
    #[tracing::instrument(skip(self, properties), fields(%digest, %purpose))]
    async fn get_blob_location(
        &self,
        repository: &str,
        digest: &Digest,
        purpose: Purpose,
        properties: &BTreeMap<String, String>,
    ) -> RegistryResult<Option<BlobLocation>> {
        validate_repository(repository)?;
        if digest.is_empty() {
            return Err(DigestError::Empty.into());
        }

        let path = blob_digest_path(repository, digest);
        let Some(location) = self.bucket.location(&path, purpose, properties).await? else {
            tracing::trace!("no direct location, transfer goes through the store");
            return Ok(None);
        };

        if purpose == Purpose::Download && !self.bucket.exists(&path).await? {
            return Err(RegistryError::BlobNotFound {
                repository: repository.to_owned(),
                digest: digest.clone(),
            });
        }

        Ok(Some(BlobLocation {
            provider: self.bucket.driver_name().to_owned(),
            purpose,
            url: location.url.to_string(),
            method: location.method.as_str().to_owned(),
            expires: location.expires,
            headers: location.headers,
            properties: location.properties,
        }))
    }
}
