//! Content digests in `algorithm:encoded` form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Digest as _;

/// Errors from parsing or computing a [`Digest`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DigestError {
    /// The string is not of the form `algorithm:encoded`.
    #[error("invalid digest format: {0:?}")]
    Format(String),

    /// The encoded part has the wrong shape for its algorithm.
    #[error("invalid {algorithm} digest encoding: {encoded:?}")]
    Encoding {
        /// Digest algorithm.
        algorithm: String,
        /// Offending encoded part.
        encoded: String,
    },

    /// The algorithm is syntactically valid but this store cannot compute it.
    #[error("unsupported digest algorithm: {0}")]
    Unsupported(String),

    /// A digest was required, but the empty digest was supplied.
    #[error("digest is empty")]
    Empty,
}

/// An algorithm-tagged content hash, e.g. `sha256:2cf24d...`.
///
/// The default value is the empty digest, which stands for "no digest". Its
/// algorithm and hex are both empty and it never equals a parsed digest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest {
    value: String,
}

impl Digest {
    /// What the empty digest stands in as when a digest string is required.
    pub const SENTINEL: &'static str = ":";

    /// The canonical algorithm.
    pub const SHA256: &'static str = "sha256";

    /// Also supported for verification.
    pub const SHA512: &'static str = "sha512";

    /// Parse and validate a digest string.
    pub fn parse(value: &str) -> Result<Self, DigestError> {
        let (algorithm, encoded) = value
            .split_once(':')
            .ok_or_else(|| DigestError::Format(value.to_owned()))?;

        if !valid_algorithm(algorithm) || encoded.is_empty() {
            return Err(DigestError::Format(value.to_owned()));
        }

        let encoding_ok = match expected_hex_len(algorithm) {
            Some(len) => {
                encoded.len() == len
                    && encoded
                        .bytes()
                        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
            }
            None => encoded
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'=' | b'_' | b'-')),
        };

        if !encoding_ok {
            return Err(DigestError::Encoding {
                algorithm: algorithm.to_owned(),
                encoded: encoded.to_owned(),
            });
        }

        Ok(Self {
            value: value.to_owned(),
        })
    }

    /// The SHA-256 digest of `data`.
    pub fn sha256(data: &[u8]) -> Self {
        Self::from_parts(Self::SHA256, &hex::encode(sha2::Sha256::digest(data)))
    }

    /// The digest of `data` under `algorithm`.
    pub fn compute(algorithm: &str, data: &[u8]) -> Result<Self, DigestError> {
        let mut hasher = Hasher::new(algorithm)?;
        hasher.update(data);
        Ok(hasher.finalize())
    }

    fn from_parts(algorithm: &str, encoded: &str) -> Self {
        Self {
            value: format!("{algorithm}:{encoded}"),
        }
    }

    /// Whether this is the empty digest.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// The algorithm, e.g. `sha256`. Empty for the empty digest.
    pub fn algorithm(&self) -> &str {
        self.value.split_once(':').map_or("", |(algorithm, _)| algorithm)
    }

    /// The encoded hash. Empty for the empty digest.
    pub fn hex(&self) -> &str {
        self.value.split_once(':').map_or("", |(_, encoded)| encoded)
    }

    /// The digest string.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// A streaming hasher for this digest's algorithm.
    pub fn hasher(&self) -> Result<Hasher, DigestError> {
        if self.is_empty() {
            return Err(DigestError::Empty);
        }
        Hasher::new(self.algorithm())
    }

    /// Whether `data` hashes to this digest.
    pub fn matches(&self, data: &[u8]) -> Result<bool, DigestError> {
        let mut hasher = self.hasher()?;
        hasher.update(data);
        Ok(hasher.finalize() == *self)
    }
}

fn expected_hex_len(algorithm: &str) -> Option<usize> {
    match algorithm {
        Digest::SHA256 => Some(64),
        Digest::SHA512 => Some(128),
        _ => None,
    }
}

/// `component (separator component)*` with lowercase alphanumeric components
/// and `+ . _ -` separators.
fn valid_algorithm(algorithm: &str) -> bool {
    let mut previous_separator = true;
    for b in algorithm.bytes() {
        match b {
            b'a'..=b'z' | b'0'..=b'9' => previous_separator = false,
            b'+' | b'.' | b'_' | b'-' if !previous_separator => previous_separator = true,
            _ => return false,
        }
    }
    !previous_separator
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl FromStr for Digest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Digest::parse(s)
    }
}

impl AsRef<str> for Digest {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.is_empty() {
            return Ok(Digest::default());
        }
        Digest::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Incremental hashing for the supported digest algorithms.
#[derive(Clone)]
pub enum Hasher {
    /// SHA-256
    Sha256(sha2::Sha256),
    /// SHA-512
    Sha512(sha2::Sha512),
}

impl fmt::Debug for Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hasher").field(&self.algorithm()).finish()
    }
}

impl Hasher {
    /// The algorithm this hasher computes.
    pub fn algorithm(&self) -> &'static str {
        match self {
            Hasher::Sha256(_) => Digest::SHA256,
            Hasher::Sha512(_) => Digest::SHA512,
        }
    }

    /// A hasher for `algorithm`.
    pub fn new(algorithm: &str) -> Result<Self, DigestError> {
        match algorithm {
            Digest::SHA256 => Ok(Hasher::Sha256(sha2::Sha256::new())),
            Digest::SHA512 => Ok(Hasher::Sha512(sha2::Sha512::new())),
            "" => Err(DigestError::Empty),
            other => Err(DigestError::Unsupported(other.to_owned())),
        }
    }

    /// Feed more data.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha256(hasher) => hasher.update(data),
            Hasher::Sha512(hasher) => hasher.update(data),
        }
    }

    /// Finish hashing.
    pub fn finalize(self) -> Digest {
        match self {
            Hasher::Sha256(hasher) => {
                Digest::from_parts(Digest::SHA256, &hex::encode(hasher.finalize()))
            }
            Hasher::Sha512(hasher) => {
                Digest::from_parts(Digest::SHA512, &hex::encode(hasher.finalize()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn sha256_of_hello() {
        let digest = Digest::sha256(b"hello");
        assert_eq!(digest.as_str(), HELLO);
        assert_eq!(digest.algorithm(), "sha256");
        assert_eq!(digest.hex().len(), 64);
        assert!(digest.matches(b"hello").unwrap());
        assert!(!digest.matches(b"hello!").unwrap());
    }

    #[test]
    fn parse_accepts_valid_digests() {
        assert_eq!(Digest::parse(HELLO).unwrap(), Digest::sha256(b"hello"));

        let sha512 = Digest::compute("sha512", b"hello").unwrap();
        assert_eq!(Digest::parse(sha512.as_str()).unwrap(), sha512);

        let custom = Digest::parse("multihash+base58:QmRZxt2b1FVZPNqd8hsiykDL3TdBDeTSPX9Kv46HoXbX").unwrap();
        assert_eq!(custom.algorithm(), "multihash+base58");
    }

    #[test]
    fn parse_rejects_malformed_digests() {
        for bad in [
            "",
            ":",
            "sha256",
            "sha256:",
            ":abc",
            "SHA256:abc",
            "sha256:abc",
            "sha256:2CF24DBA5FB0A30E26E83B2AC5B9E29E1B161E5C1FA7425E73043362938B9824",
            "sha+:abc",
            "+sha:abc",
            "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b98/4",
        ] {
            assert!(Digest::parse(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn empty_digest() {
        let empty = Digest::default();
        assert!(empty.is_empty());
        assert_eq!(empty.algorithm(), "");
        assert_eq!(empty.hex(), "");
        assert_ne!(empty, Digest::sha256(b""));
        assert_eq!(empty.hasher().unwrap_err(), DigestError::Empty);
    }

    #[test]
    fn unknown_algorithms_cannot_be_computed() {
        let digest = Digest::parse("blake3:abcdef").unwrap();
        assert_eq!(
            digest.matches(b"x").unwrap_err(),
            DigestError::Unsupported("blake3".into())
        );
    }

    #[test]
    fn serde_as_string() {
        let digest = Digest::sha256(b"hello");
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{HELLO}\""));
        assert_eq!(serde_json::from_str::<Digest>(&json).unwrap(), digest);
        assert!(serde_json::from_str::<Digest>(r#""""#).unwrap().is_empty());
        assert!(serde_json::from_str::<Digest>(r#""nope""#).is_err());
    }
}
