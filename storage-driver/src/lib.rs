//! # Storage drivers
//!
//! The contract a storage backend implements to hold registry objects: streaming
//! reads and writes keyed by bucket and path, object metadata, listing, and
//! negotiation of direct-transfer locations.

mod driver;
mod error;
mod location;

pub use driver::Driver;
pub use driver::Metadata;
pub use driver::Reader;
pub use driver::Writer;
pub use error::{StorageError, StorageErrorBuilder, StorageErrorKind};
pub use location::{Location, LocationRequest, Purpose, UnknownPurpose};
