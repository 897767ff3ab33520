//! Manifest references and repository names.

use std::fmt;

use crate::digest::Digest;
use crate::error::{RegistryError, RegistryResult};

/// How a manifest is addressed within a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference<'r> {
    /// A mutable name. Writing it again replaces the manifest.
    Tag(&'r str),

    /// The manifest's own digest. Content written under it must hash to it.
    Digest(Digest),
}

impl<'r> Reference<'r> {
    /// Classify a reference string.
    ///
    /// Anything containing `:` must be a valid digest. References may not be
    /// empty, contain `/`, or be `.` or `..`, since each of those would change
    /// the shape of the manifest path.
    pub fn parse(reference: &'r str) -> RegistryResult<Self> {
        if reference.is_empty()
            || reference == "."
            || reference == ".."
            || reference.contains('/')
        {
            return Err(RegistryError::InvalidReference(reference.to_owned()));
        }

        if reference.contains(':') {
            return Ok(Reference::Digest(Digest::parse(reference)?));
        }

        Ok(Reference::Tag(reference))
    }

    /// The reference as it appears in paths and index entries.
    pub fn as_str(&self) -> &str {
        match self {
            Reference::Tag(tag) => tag,
            Reference::Digest(digest) => digest.as_str(),
        }
    }

    /// Whether this reference is a digest.
    pub fn is_digest(&self) -> bool {
        matches!(self, Reference::Digest(_))
    }
}

impl fmt::Display for Reference<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check that a repository name is a clean, relative, slash-separated path.
pub fn validate_repository(repository: &str) -> RegistryResult<()> {
    let valid = !repository.is_empty()
        && repository
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");

    if valid {
        Ok(())
    } else {
        Err(RegistryError::InvalidRepository(repository.to_owned()))
    }
}
