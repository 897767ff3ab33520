use super::RegistryStorage;
use crate::error::{RegistryError, RegistryResult};
use crate::path::index_path;
use crate::reference::validate_repository;
use crate::store::IndexStore;
use crate::types::Index;

#[async_trait::async_trait]
impl IndexStore for RegistryStorage {
    #[tracing::instrument(skip(self))]
    async fn get_global_index(&self, search: &str) -> RegistryResult<Index> {
        let index = self.read_index(&index_path("")).await?;
        Ok(index.unwrap_or_default().filtered(search))
    }

    #[tracing::instrument(skip(self))]
    async fn get_index(&self, repository: &str, search: &str) -> RegistryResult<Index> {
        validate_repository(repository)?;
        self.read_index(&index_path(repository))
            .await?
            .map(|index| index.filtered(search))
            .ok_or_else(|| RegistryError::IndexNotFound(repository.to_owned()))
    }

    #[tracing::instrument(skip(self))]
    async fn remove_index(&self, repository: &str) -> RegistryResult<()> {
        validate_repository(repository)?;
        let _guard = self.index_lock.lock().await;

        self.bucket
            .delete(&index_path(repository))
            .await
            .map_err(RegistryError::index(repository))?;

        self.update_global(|global| {
            global.remove(repository);
        })
        .await
    }
}
