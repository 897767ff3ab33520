//! Error types for the registry store

use http::StatusCode;
use storage::{StorageError, StorageErrorKind};

use crate::digest::{Digest, DigestError};

/// Result type for registry store operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// The three ways a registry store operation can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A repository, reference, digest or index does not exist.
    NotFound,

    /// The request or its content was rejected, e.g. a digest mismatch.
    Validation,

    /// The storage medium failed.
    Backend,
}

/// Error types for registry store operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Blob not found
    #[error("blob not found: {repository}@{digest}")]
    BlobNotFound {
        /// Repository searched
        repository: String,
        /// Requested digest
        digest: Digest,
    },

    /// Manifest not found
    #[error("manifest not found: {repository}:{reference}")]
    ManifestNotFound {
        /// Repository searched
        repository: String,
        /// Requested reference
        reference: String,
    },

    /// Index not found
    #[error("index not found: {0}")]
    IndexNotFound(String),

    /// Invalid digest
    #[error(transparent)]
    InvalidDigest(#[from] DigestError),

    /// Content does not hash to the digest it was written under
    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch {
        /// Expected digest
        expected: Digest,
        /// Actual digest
        actual: Digest,
    },

    /// Content length does not match the declared length
    #[error("content length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        /// Declared length
        expected: u64,
        /// Bytes actually read
        actual: u64,
    },

    /// Invalid manifest reference
    #[error("invalid reference: {0:?}")]
    InvalidReference(String),

    /// Invalid repository name
    #[error("invalid repository name: {0:?}")]
    InvalidRepository(String),

    /// Storage error
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A stored document could not be decoded
    #[error("corrupt document at {path}: {source}")]
    Corrupt {
        /// Path of the document
        path: String,
        /// Decoding error
        #[source]
        source: serde_json::Error,
    },

    /// A document could not be encoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RegistryError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::BlobNotFound { .. }
            | RegistryError::ManifestNotFound { .. }
            | RegistryError::IndexNotFound(_) => ErrorKind::NotFound,
            RegistryError::InvalidDigest(_)
            | RegistryError::DigestMismatch { .. }
            | RegistryError::LengthMismatch { .. }
            | RegistryError::InvalidReference(_)
            | RegistryError::InvalidRepository(_) => ErrorKind::Validation,
            RegistryError::Storage(err) if err.kind() == StorageErrorKind::NotFound => {
                ErrorKind::NotFound
            }
            RegistryError::Storage(err) if err.kind() == StorageErrorKind::InvalidRequest => {
                ErrorKind::Validation
            }
            RegistryError::Storage(_)
            | RegistryError::Corrupt { .. }
            | RegistryError::Serialization(_) => ErrorKind::Backend,
        }
    }

    /// Whether something requested was absent, whichever operation failed.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Backend => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for distribution-style error responses
    pub fn error_code(&self) -> &'static str {
        match self {
            RegistryError::BlobNotFound { .. } => "BLOB_UNKNOWN",
            RegistryError::ManifestNotFound { .. } => "MANIFEST_UNKNOWN",
            RegistryError::IndexNotFound(_) => "NAME_UNKNOWN",
            RegistryError::InvalidDigest(_) | RegistryError::DigestMismatch { .. } => {
                "DIGEST_INVALID"
            }
            RegistryError::LengthMismatch { .. } => "SIZE_INVALID",
            RegistryError::InvalidReference(_) => "TAG_INVALID",
            RegistryError::InvalidRepository(_) => "NAME_INVALID",
            RegistryError::Storage(_)
            | RegistryError::Corrupt { .. }
            | RegistryError::Serialization(_) => "UNKNOWN",
        }
    }

    /// Map a storage error for a blob, turning a missing object into
    /// [`RegistryError::BlobNotFound`].
    pub(crate) fn blob(repository: &str, digest: &Digest) -> impl FnOnce(StorageError) -> Self {
        let repository = repository.to_owned();
        let digest = digest.clone();
        move |err| {
            if err.is_not_found() {
                RegistryError::BlobNotFound { repository, digest }
            } else {
                RegistryError::Storage(err)
            }
        }
    }

    /// Map a storage error for a manifest, turning a missing object into
    /// [`RegistryError::ManifestNotFound`].
    pub(crate) fn manifest(repository: &str, reference: &str) -> impl FnOnce(StorageError) -> Self {
        let repository = repository.to_owned();
        let reference = reference.to_owned();
        move |err| {
            if err.is_not_found() {
                RegistryError::ManifestNotFound {
                    repository,
                    reference,
                }
            } else {
                RegistryError::Storage(err)
            }
        }
    }

    /// Map a storage error for an index, turning a missing object into
    /// [`RegistryError::IndexNotFound`].
    pub(crate) fn index(repository: &str) -> impl FnOnce(StorageError) -> Self {
        let repository = repository.to_owned();
        move |err| {
            if err.is_not_found() {
                RegistryError::IndexNotFound(repository)
            } else {
                RegistryError::Storage(err)
            }
        }
    }
}

/// Whether `err` means something requested was absent.
///
/// True for blobs, manifests, and indices alike, so callers can map every
/// not-found condition to one response without inspecting which operation
/// failed.
pub fn is_not_found(err: &RegistryError) -> bool {
    err.is_not_found()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_uniform() {
        let errors = [
            RegistryError::BlobNotFound {
                repository: "a".into(),
                digest: Digest::sha256(b"x"),
            },
            RegistryError::ManifestNotFound {
                repository: "a".into(),
                reference: "v1".into(),
            },
            RegistryError::IndexNotFound("a".into()),
            RegistryError::Storage(StorageError::not_found("memory", "registry", "a/index.json")),
        ];

        for err in &errors {
            assert!(is_not_found(err), "{err}");
            assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn other_kinds() {
        let mismatch = RegistryError::DigestMismatch {
            expected: Digest::sha256(b"a"),
            actual: Digest::sha256(b"b"),
        };
        assert_eq!(mismatch.kind(), ErrorKind::Validation);
        assert_eq!(mismatch.error_code(), "DIGEST_INVALID");
        assert!(!is_not_found(&mismatch));

        let backend = RegistryError::Storage(StorageError::io(
            "local",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope"),
        ));
        assert_eq!(backend.kind(), ErrorKind::Backend);
        assert_eq!(backend.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn storage_errors_map_to_specific_not_found() {
        let digest = Digest::sha256(b"x");
        let err = RegistryError::blob("a", &digest)(StorageError::not_found("memory", "r", "p"));
        assert!(matches!(err, RegistryError::BlobNotFound { .. }));

        let err = RegistryError::manifest("a", "v1")(StorageError::io(
            "local",
            std::io::Error::other("disk"),
        ));
        assert!(matches!(err, RegistryError::Storage(_)));
    }
}
