//! # Registry store
//!
//! The storage abstraction behind a content-addressable artifact registry.
//! Repositories hold immutable blobs addressed by digest and manifests
//! addressed by tag or digest; per-repository and global indices make them
//! searchable.
//!
//! The capabilities are split into [`BlobStore`], [`ManifestStore`],
//! [`IndexStore`] and [`LocationResolver`], which together make up a
//! [`RegistryStore`]. [`RegistryStorage`] implements all of them on top of any
//! [`storage`] driver.
//!
//! ## Example
//!
//! ```no_run
//! use registry_store::{BlobContent, BlobStore, Digest, StoreBuilder};
//! use storage::MemoryStorage;
//!
//! # async fn example() -> Result<(), registry_store::RegistryError> {
//! let store = StoreBuilder::new(MemoryStorage::new().into())
//!     .bucket("registry")
//!     .build();
//!
//! let digest = Digest::sha256(b"hello");
//! store
//!     .put_blob("alice/net", &digest, BlobContent::from_bytes(&b"hello"[..]))
//!     .await?;
//! assert!(store.exists_blob("alice/net", &digest).await?);
//! # Ok(())
//! # }
//! ```

mod backend;
mod config;
mod digest;
mod error;
pub mod path;
mod reference;
mod store;
mod types;
mod verify;

pub use backend::{RegistryStorage, DEFAULT_BUCKET};
pub use config::{ConfigError, RegistryConfig, StoreBuilder};
pub use digest::{Digest, DigestError, Hasher};
pub use error::{is_not_found, ErrorKind, RegistryError, RegistryResult};
pub use reference::{validate_repository, Reference};
pub use store::{
    BlobContent, BlobLocation, BlobMeta, BlobStore, IndexStore, LocationResolver, ManifestStore,
    RegistryStore,
};
pub use types::{
    Descriptor, Index, Manifest, MEDIA_TYPE_CONFIG, MEDIA_TYPE_INDEX, MEDIA_TYPE_MANIFEST,
    MEDIA_TYPE_OCTET_STREAM,
};

#[doc(no_inline)]
pub use storage::Purpose;
