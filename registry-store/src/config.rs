//! Configuration for a driver-backed registry store.
//!
//! ```toml
//! bucket = "registry"
//!
//! [storage.local]
//! path = "/var/lib/registry"
//!
//! [redirect]
//! base = "https://objects.example.com"
//! upload = true
//! ```

use serde::Deserialize;
use storage::{RedirectConfig, Storage, StorageConfig, StorageError};

use crate::backend::{RegistryStorage, DEFAULT_BUCKET};

/// Errors loading or applying a [`RegistryConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration document is malformed.
    #[error("invalid registry configuration: {0}")]
    Parse(#[from] toml_edit::de::Error),

    /// The storage driver could not be set up.
    #[error("unable to set up storage: {0}")]
    Storage(#[from] StorageError),
}

/// Configuration for a [`RegistryStorage`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RegistryConfig {
    /// Bucket holding all registry objects.
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// The storage driver.
    pub storage: StorageConfig,

    /// Grant direct-transfer locations for blobs.
    #[serde(default)]
    pub redirect: Option<RedirectConfig>,
}

fn default_bucket() -> String {
    DEFAULT_BUCKET.to_owned()
}

impl RegistryConfig {
    /// Parse a TOML document.
    pub fn from_toml(document: &str) -> Result<Self, ConfigError> {
        Ok(toml_edit::de::from_str(document)?)
    }

    /// Set up the storage driver and the store on top of it.
    #[tracing::instrument(skip(self), fields(bucket = %self.bucket))]
    pub async fn build(self) -> Result<RegistryStorage, ConfigError> {
        let storage = self.storage.build().await?;
        let mut builder = StoreBuilder::new(storage).bucket(self.bucket);
        if let Some(redirect) = self.redirect {
            builder = builder.redirect(redirect);
        }
        Ok(builder.build())
    }
}

/// Builds a [`RegistryStorage`] programmatically.
#[derive(Debug)]
pub struct StoreBuilder {
    storage: Storage,
    bucket: Option<String>,
    redirect: Option<RedirectConfig>,
}

impl StoreBuilder {
    /// Start from a storage driver.
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            bucket: None,
            redirect: None,
        }
    }

    /// Set the bucket name for storage
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Grant direct-transfer locations under `config.base`.
    pub fn redirect(mut self, config: RedirectConfig) -> Self {
        self.redirect = Some(config);
        self
    }

    /// Build the store.
    pub fn build(self) -> RegistryStorage {
        let storage = match self.redirect {
            Some(config) => self.storage.with_redirect(config),
            None => self.storage,
        };
        let bucket = self.bucket.unwrap_or_else(default_bucket);
        RegistryStorage::new(storage, bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_config() {
        let config = RegistryConfig::from_toml(r#"storage = "memory""#).unwrap();
        assert_eq!(config.bucket, DEFAULT_BUCKET);
        assert!(matches!(config.storage, StorageConfig::Memory));
        assert!(config.redirect.is_none());
    }

    #[test]
    fn local_config_with_redirect() {
        let config = RegistryConfig::from_toml(
            r#"
            bucket = "models"

            [storage.local]
            path = "/var/lib/registry"

            [redirect]
            base = "https://objects.example.test/registry"
            upload = true
            "#,
        )
        .unwrap();

        assert_eq!(config.bucket, "models");
        match &config.storage {
            StorageConfig::Local { path } => assert_eq!(path, "/var/lib/registry"),
            other => panic!("unexpected storage: {other:?}"),
        }
        let redirect = config.redirect.unwrap();
        assert!(redirect.upload);
        assert_eq!(redirect.expiry, 15 * 60);
    }

    #[test]
    fn storage_is_required() {
        let err = RegistryConfig::from_toml(r#"bucket = "models""#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "{err}");
    }

    #[tokio::test]
    async fn build_memory_store() {
        let store = RegistryConfig::from_toml(r#"storage = "memory""#)
            .unwrap()
            .build()
            .await
            .unwrap();
        assert_eq!(store.bucket().name(), DEFAULT_BUCKET);
        assert_eq!(store.bucket().driver_name(), "memory");
    }
}
