//! Canonical storage paths for registry objects.
//!
//! The layout is fixed, since existing stores and tooling depend on it:
//!
//! ```text
//! <repository>/blobs/<algorithm>/<hex>
//! <repository>/manifests/<reference>
//! <repository>/index.json
//! index.json                          (global index)
//! ```
//!
//! Paths are joined and lexically cleaned the way a POSIX path join does:
//! empty segments are dropped, `.` is removed and `..` is resolved. These
//! functions are total; odd input produces an odd (but deterministic) path.

use camino::Utf8PathBuf;

use crate::digest::Digest;

/// File name of an index document, both per repository and global.
pub const INDEX_FILE_NAME: &str = "index.json";

const BLOBS: &str = "blobs";
const MANIFESTS: &str = "manifests";

/// Path of the blob `digest` in `repository`.
///
/// The empty digest is substituted by [`Digest::SENTINEL`], whose algorithm
/// and hex are both empty, so it maps to `<repository>/blobs`. That can never
/// collide with the path of a real blob.
pub fn blob_digest_path(repository: &str, digest: &Digest) -> Utf8PathBuf {
    let (algorithm, hex) = if digest.is_empty() {
        Digest::SENTINEL.split_once(':').unwrap_or_default()
    } else {
        (digest.algorithm(), digest.hex())
    };
    join(&[repository, BLOBS, algorithm, hex]).into()
}

/// Directory holding every blob of `repository`.
pub fn blobs_path(repository: &str) -> Utf8PathBuf {
    join(&[repository, BLOBS]).into()
}

/// Path of the manifest named by `reference` in `repository`.
pub fn manifest_path(repository: &str, reference: &str) -> Utf8PathBuf {
    join(&[repository, MANIFESTS, reference]).into()
}

/// Path of the index document of `repository`.
///
/// The global index is `index_path("")`.
pub fn index_path(repository: &str) -> Utf8PathBuf {
    join(&[repository, INDEX_FILE_NAME]).into()
}

/// Split a manifest path back into `(repository, reference)`.
///
/// The reference is everything after the final `/`. A `manifests` segment is
/// then removed from the directory part, either as its last segment
/// (`<repository>/manifests/<reference>`, the form [`manifest_path`] builds) or
/// as a leading prefix (`manifests/<repository>/<reference>`).
///
/// For any clean repository and any reference without `/`, this inverts
/// [`manifest_path`]. A reference containing `/` is split at its last `/`.
pub fn split_manifest_path(path: &str) -> (&str, &str) {
    let (dir, reference) = path.rsplit_once('/').unwrap_or(("", path));

    let repository = if dir == MANIFESTS {
        ""
    } else if let Some(repository) = dir.strip_suffix("/manifests") {
        repository
    } else if let Some(repository) = dir.strip_prefix("manifests/") {
        repository
    } else {
        dir
    };

    (repository, reference)
}

/// Join non-empty `parts` with `/` and clean the result.
///
/// Returns the empty string when every part is empty.
pub(crate) fn join(parts: &[&str]) -> String {
    let parts: Vec<&str> = parts.iter().copied().filter(|p| !p.is_empty()).collect();
    if parts.is_empty() {
        return String::new();
    }
    clean(&parts.join("/"))
}

/// Lexically clean a slash-separated path.
pub(crate) fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_owned();
    }

    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push("..");
                }
            }
            segment => segments.push(segment),
        }
    }

    let joined = segments.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_owned(),
        (false, false) => joined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn blob_path_layout() {
        let digest = Digest::parse(HELLO).unwrap();
        assert_eq!(
            blob_digest_path("alice/net", &digest),
            "alice/net/blobs/sha256/2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn empty_digest_path() {
        let path = blob_digest_path("alice/net", &Digest::default());
        assert_eq!(path, "alice/net/blobs");
        assert_ne!(path, blob_digest_path("alice/net", &Digest::sha256(b"")));
        assert_eq!(blob_digest_path("", &Digest::default()), "blobs");
    }

    #[test]
    fn manifest_and_index_paths() {
        assert_eq!(manifest_path("alice/net", "v1"), "alice/net/manifests/v1");
        assert_eq!(
            manifest_path("alice/net", HELLO),
            format!("alice/net/manifests/{HELLO}")
        );
        assert_eq!(index_path("alice/net"), "alice/net/index.json");
        assert_eq!(index_path(""), "index.json");
        assert_eq!(blobs_path("alice/net"), "alice/net/blobs");
    }

    #[test]
    fn paths_are_cleaned() {
        assert_eq!(manifest_path("alice//net/", "v1"), "alice/net/manifests/v1");
        assert_eq!(manifest_path("alice/./net", "v1"), "alice/net/manifests/v1");
        assert_eq!(manifest_path("alice/../bob", "v1"), "bob/manifests/v1");
        assert_eq!(manifest_path("", "v1"), "manifests/v1");
    }

    #[test]
    fn split_inverts_construction() {
        for (repository, reference) in [
            ("alice/net", "v1"),
            ("alice/net", HELLO),
            ("a", "latest"),
            ("", "v1"),
            ("manifests/nested", "v2"),
            ("deep/ly/nest/ed", "1.0.0-rc.1"),
        ] {
            let path = manifest_path(repository, reference);
            assert_eq!(
                split_manifest_path(path.as_str()),
                (repository, reference),
                "{path}"
            );
        }
    }

    #[test]
    fn split_leading_manifests_prefix() {
        assert_eq!(
            split_manifest_path("manifests/alice/net/v1"),
            ("alice/net", "v1")
        );
        assert_eq!(split_manifest_path("v1"), ("", "v1"));
    }

    #[test]
    fn split_reference_with_separator_is_ambiguous() {
        let path = manifest_path("alice", "feature/x");
        assert_eq!(split_manifest_path(path.as_str()), ("alice/manifests/feature", "x"));
    }

    #[test]
    fn clean_matches_posix_join() {
        assert_eq!(clean(""), ".");
        assert_eq!(clean("/"), "/");
        assert_eq!(clean("/../a"), "/a");
        assert_eq!(clean("../a/.."), "..");
        assert_eq!(clean("a/b/../../.."), "..");
        assert_eq!(join(&["", ""]), "");
    }
}
