use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

use tracing_error::SpanTrace;

/// Categorizes storage errors by what went wrong, independent of the
/// backend that produced them.
///
/// Callers branch on the kind instead of on error messages, so a missing
/// object looks the same whether it came from memory, disk, or a remote
/// object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    /// The requested object or bucket does not exist.
    NotFound,

    /// The backend refused the operation.
    PermissionDenied,

    /// The operation failed while moving bytes (disk, network, ...).
    Io,

    /// The request itself was malformed.
    InvalidRequest,

    /// The content supplied for a write was rejected while it was being read.
    ///
    /// Writes that fail this way never become visible.
    InvalidData,

    /// Anything the driver could not classify.
    Other,
}

impl StorageErrorKind {
    /// Classify an I/O error.
    pub fn from_io(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => StorageErrorKind::PermissionDenied,
            std::io::ErrorKind::InvalidData => StorageErrorKind::InvalidData,
            std::io::ErrorKind::InvalidInput => StorageErrorKind::InvalidRequest,
            _ => StorageErrorKind::Io,
        }
    }
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageErrorKind::NotFound => write!(f, "not found"),
            StorageErrorKind::PermissionDenied => write!(f, "permission denied"),
            StorageErrorKind::Io => write!(f, "I/O error"),
            StorageErrorKind::InvalidRequest => write!(f, "invalid request"),
            StorageErrorKind::InvalidData => write!(f, "invalid data"),
            StorageErrorKind::Other => write!(f, "other error"),
        }
    }
}

#[derive(Debug)]
struct ErrorTrace {
    /// Capture is controlled by `RUST_BACKTRACE`.
    backtrace: Backtrace,

    /// The span context at the point where the error was created.
    span_trace: SpanTrace,
}

impl ErrorTrace {
    #[track_caller]
    fn capture() -> Self {
        ErrorTrace {
            backtrace: Backtrace::capture(),
            span_trace: SpanTrace::capture(),
        }
    }
}

/// An error reported by a storage driver.
///
/// Carries the [`StorageErrorKind`], the engine which produced it, the
/// bucket and path involved where known, and the underlying error.
///
/// ```rust
/// use storage_driver::{StorageError, StorageErrorKind};
///
/// let error = StorageError::builder(
///     "memory",
///     StorageErrorKind::NotFound,
///     std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
/// )
/// .bucket("registry")
/// .path("library/net/blobs/sha256/abc")
/// .build();
///
/// assert_eq!(error.kind(), StorageErrorKind::NotFound);
/// assert_eq!(error.bucket(), Some("registry"));
/// ```
#[derive(Debug)]
pub struct StorageError {
    kind: StorageErrorKind,
    engine: &'static str,
    object: ObjectContext,
    source: Box<dyn StdError + Send + Sync + 'static>,
    traces: Box<ErrorTrace>,
}

/// Where in the store an error happened.
#[derive(Debug, Default)]
struct ObjectContext {
    bucket: Option<String>,
    path: Option<String>,
    context: Option<String>,
}

impl StdError for StorageError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}

impl StorageError {
    /// Create a new storage error with the minimum required information.
    #[track_caller]
    pub fn new<E>(engine: &'static str, kind: StorageErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Self {
            kind,
            engine,
            object: ObjectContext::default(),
            source: error.into(),
            traces: Box::new(ErrorTrace::capture()),
        }
    }

    /// Create a storage error from an I/O error, classifying it by
    /// [`StorageErrorKind::from_io`].
    #[track_caller]
    pub fn io(engine: &'static str, error: std::io::Error) -> Self {
        let kind = StorageErrorKind::from_io(&error);
        Self::new(engine, kind, error)
    }

    /// A builder for an error with bucket, path, or context attached.
    pub fn builder<E>(engine: &'static str, kind: StorageErrorKind, error: E) -> StorageErrorBuilder
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        StorageErrorBuilder {
            engine,
            kind,
            source: error.into(),
            object: ObjectContext::default(),
        }
    }

    /// A closure suitable for `map_err`.
    ///
    /// ```rust
    /// use storage_driver::{StorageError, StorageErrorKind};
    ///
    /// fn operation() -> Result<(), StorageError> {
    ///     "12".parse::<u8>()
    ///         .map_err(StorageError::with("local", StorageErrorKind::InvalidRequest))?;
    ///     Ok(())
    /// }
    /// # operation().unwrap();
    /// ```
    pub fn with<E>(
        engine: &'static str,
        kind: StorageErrorKind,
    ) -> impl FnOnce(E) -> StorageError + Send + Sync
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        move |error: E| StorageError::new(engine, kind, error)
    }

    /// A missing object at `bucket`/`path`.
    #[track_caller]
    pub fn not_found(engine: &'static str, bucket: &str, path: &str) -> Self {
        Self::builder(
            engine,
            StorageErrorKind::NotFound,
            std::io::Error::new(std::io::ErrorKind::NotFound, format!("not found: {path}")),
        )
        .bucket(bucket)
        .path(path)
        .build()
    }

    /// The error kind.
    pub fn kind(&self) -> StorageErrorKind {
        self.kind
    }

    /// Whether the object or bucket was missing.
    pub fn is_not_found(&self) -> bool {
        self.kind == StorageErrorKind::NotFound
    }

    /// The storage engine name.
    pub fn engine(&self) -> &'static str {
        self.engine
    }

    /// The bucket name, if available.
    pub fn bucket(&self) -> Option<&str> {
        self.object.bucket.as_deref()
    }

    /// The object path, if available.
    pub fn path(&self) -> Option<&str> {
        self.object.path.as_deref()
    }

    /// Additional context, if available.
    pub fn context(&self) -> Option<&str> {
        self.object.context.as_deref()
    }

    /// The captured backtrace.
    pub fn backtrace(&self) -> &Backtrace {
        &self.traces.backtrace
    }

    /// The captured span trace.
    pub fn span_trace(&self) -> &SpanTrace {
        &self.traces.span_trace
    }

    /// Attach a path to an existing error.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.object.path = Some(path.into());
        self
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Storage error [{}] from {}{}: {}",
            self.kind, self.engine, self.object, self.source
        )
    }
}

impl fmt::Display for ObjectContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = [
            ("bucket: ", &self.bucket),
            ("path: ", &self.path),
            ("", &self.context),
        ];
        for (label, value) in fields {
            if let Some(value) = value {
                write!(f, " ({label}{value})")?;
            }
        }
        Ok(())
    }
}

/// Builder for a [`StorageError`] with optional context fields.
#[derive(Debug)]
pub struct StorageErrorBuilder {
    kind: StorageErrorKind,
    engine: &'static str,
    source: Box<dyn StdError + Send + Sync + 'static>,
    object: ObjectContext,
}

impl StorageErrorBuilder {
    /// Set the bucket name.
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.object.bucket = Some(bucket.into());
        self
    }

    /// Set the object path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.object.path = Some(path.into());
        self
    }

    /// Describe what the driver was doing.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.object.context = Some(context.into());
        self
    }

    /// Build the error.
    #[track_caller]
    pub fn build(self) -> StorageError {
        StorageError {
            kind: self.kind,
            engine: self.engine,
            object: self.object,
            source: self.source,
            traces: Box::new(ErrorTrace::capture()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_classified() {
        let err = StorageError::io(
            "local",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.is_not_found());

        let err = StorageError::io(
            "local",
            std::io::Error::new(std::io::ErrorKind::InvalidData, "digest"),
        );
        assert_eq!(err.kind(), StorageErrorKind::InvalidData);

        let err = StorageError::io("local", std::io::Error::other("disk on fire"));
        assert_eq!(err.kind(), StorageErrorKind::Io);
    }

    #[test]
    fn display_includes_location() {
        let err = StorageError::not_found("memory", "registry", "a/blobs/sha256/00");
        let message = err.to_string();
        assert!(message.contains("[not found]"), "{message}");
        assert!(message.contains("bucket: registry"), "{message}");
        assert!(message.contains("path: a/blobs/sha256/00"), "{message}");
    }

    #[test]
    fn builder_records_context() {
        let err = StorageError::builder("local", StorageErrorKind::InvalidRequest, "bad expiry")
            .path("a/blobs/sha256/00")
            .context("negotiating location")
            .build();

        assert_eq!(err.engine(), "local");
        assert_eq!(err.bucket(), None);
        assert_eq!(err.context(), Some("negotiating location"));
        assert_eq!(
            err.to_string(),
            "Storage error [invalid request] from local \
             (path: a/blobs/sha256/00) (negotiating location): bad expiry"
        );
    }
}
