//! A reader which checks content against its digest as it streams.

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use pin_project::pin_project;
use tokio::io::{self, AsyncRead, ReadBuf};

use crate::digest::{Digest, DigestError, Hasher};
use crate::error::RegistryError;

/// Why verified content was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum Mismatch {
    #[error("digest mismatch: expected {expected}, got {actual}")]
    Digest { expected: Digest, actual: Digest },

    #[error("content length mismatch: expected {expected} bytes, got {actual}")]
    Length { expected: u64, actual: u64 },
}

impl From<Mismatch> for RegistryError {
    fn from(value: Mismatch) -> Self {
        match value {
            Mismatch::Digest { expected, actual } => {
                RegistryError::DigestMismatch { expected, actual }
            }
            Mismatch::Length { expected, actual } => {
                RegistryError::LengthMismatch { expected, actual }
            }
        }
    }
}

/// Hashes and counts everything read through it.
///
/// At EOF the result is compared with the expected digest and length. On a
/// mismatch the final read fails with [`io::ErrorKind::InvalidData`] instead
/// of reporting EOF, so a driver consuming this reader aborts its write
/// rather than committing bad content.
#[pin_project]
#[derive(Debug)]
pub(crate) struct Verify<R> {
    #[pin]
    inner: R,
    hasher: Option<Hasher>,
    expected: Digest,
    expected_length: Option<u64>,
    read: u64,
    mismatch: Option<Mismatch>,
}

impl<R> Verify<R> {
    pub(crate) fn new(
        inner: R,
        expected: Digest,
        expected_length: Option<u64>,
    ) -> Result<Self, DigestError> {
        let hasher = expected.hasher()?;
        Ok(Self {
            inner,
            hasher: Some(hasher),
            expected,
            expected_length,
            read: 0,
            mismatch: None,
        })
    }

    /// The reason the content was rejected, once EOF has been reached.
    pub(crate) fn mismatch(&self) -> Option<&Mismatch> {
        self.mismatch.as_ref()
    }
}

impl<R> AsyncRead for Verify<R>
where
    R: AsyncRead,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.project();

        if let Some(mismatch) = this.mismatch.as_ref() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::InvalidData,
                mismatch.clone(),
            )));
        }

        let before = buf.filled().len();
        let wants_more = buf.remaining() > 0;
        ready!(this.inner.poll_read(cx, buf))?;
        let fresh = &buf.filled()[before..];

        if !fresh.is_empty() {
            *this.read += fresh.len() as u64;
            if let Some(hasher) = this.hasher.as_mut() {
                hasher.update(fresh);
            }
            return Poll::Ready(Ok(()));
        }

        if !wants_more {
            return Poll::Ready(Ok(()));
        }

        // EOF: check what was read exactly once.
        let Some(hasher) = this.hasher.take() else {
            return Poll::Ready(Ok(()));
        };

        let actual = hasher.finalize();
        let mismatch = if actual != *this.expected {
            Some(Mismatch::Digest {
                expected: this.expected.clone(),
                actual,
            })
        } else {
            match *this.expected_length {
                Some(expected) if expected != *this.read => Some(Mismatch::Length {
                    expected,
                    actual: *this.read,
                }),
                _ => None,
            }
        };

        match mismatch {
            Some(mismatch) => {
                tracing::debug!(%mismatch, "rejecting content");
                *this.mismatch = Some(mismatch.clone());
                Poll::Ready(Err(io::Error::new(io::ErrorKind::InvalidData, mismatch)))
            }
            None => Poll::Ready(Ok(())),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt as _;

    use super::*;

    #[tokio::test]
    async fn passes_matching_content() {
        let data: &[u8] = b"hello";
        let mut reader = Verify::new(data, Digest::sha256(b"hello"), Some(5)).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello");
        assert!(reader.mismatch().is_none());
    }

    #[tokio::test]
    async fn rejects_wrong_digest_at_eof() {
        let data: &[u8] = b"hello";
        let expected = Digest::sha256(b"goodbye");
        let mut reader = Verify::new(data, expected.clone(), None).unwrap();
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(
            reader.mismatch(),
            Some(&Mismatch::Digest {
                expected,
                actual: Digest::sha256(b"hello"),
            })
        );
    }

    #[tokio::test]
    async fn rejects_wrong_length() {
        let data: &[u8] = b"hello";
        let mut reader = Verify::new(data, Digest::sha256(b"hello"), Some(4)).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap_err();
        assert_eq!(
            reader.mismatch(),
            Some(&Mismatch::Length {
                expected: 4,
                actual: 5
            })
        );
    }

    #[test]
    fn needs_a_computable_digest() {
        let data: &[u8] = b"";
        assert_eq!(
            Verify::new(data, Digest::default(), None).unwrap_err(),
            DigestError::Empty
        );
    }
}
