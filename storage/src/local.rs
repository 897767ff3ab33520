use camino::{Utf8Path, Utf8PathBuf};
use eyre::WrapErr;
use tokio::io::AsyncWriteExt;
use tracing::Instrument;

use storage_driver::{Driver, Metadata, Reader, StorageError, StorageErrorKind};

/// Prefix of in-flight upload files, which are never listed.
const TEMP_PREFIX: &str = ".upload-";

/// Storage driver backed by a directory on the local filesystem.
///
/// Objects live at `<root>/<bucket>/<path>`. Uploads are written to a
/// temporary file next to the destination and renamed into place once the
/// reader is exhausted, so readers never see a partial object.
#[derive(Debug)]
pub struct LocalDriver {
    root: Utf8PathBuf,
}

impl LocalDriver {
    /// Create a driver rooted at `root`.
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    /// The root directory of this driver.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn path(&self, bucket: &str, remote: &Utf8Path) -> Utf8PathBuf {
        let mut path = self.root.join(bucket);
        path.push(remote);
        path
    }

    fn error(&self, bucket: &str, remote: &Utf8Path, err: std::io::Error) -> StorageError {
        StorageError::builder(self.name(), StorageErrorKind::from_io(&err), err)
            .bucket(bucket)
            .path(remote.as_str())
            .build()
    }
}

#[async_trait::async_trait]
impl Driver for LocalDriver {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn metadata(&self, bucket: &str, remote: &Utf8Path) -> Result<Metadata, StorageError> {
        let path = self.path(bucket, remote);
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|err| self.error(bucket, remote, err))?;
        if metadata.is_dir() {
            return Err(StorageError::not_found(self.name(), bucket, remote.as_str()));
        }

        // Not every filesystem records a creation time.
        let created = metadata
            .created()
            .or_else(|_| metadata.modified())
            .map_err(|err| self.error(bucket, remote, err))?;

        Ok(Metadata {
            size: metadata.len(),
            created: created.into(),
        })
    }

    async fn delete(&self, bucket: &str, remote: &Utf8Path) -> Result<(), StorageError> {
        let path = self.path(bucket, remote);
        if let Err(err) = tokio::fs::remove_file(&path).await {
            // Directories are not objects, as in `metadata`.
            if tokio::fs::metadata(&path)
                .await
                .is_ok_and(|metadata| metadata.is_dir())
            {
                return Err(StorageError::not_found(self.name(), bucket, remote.as_str()));
            }
            return Err(self.error(bucket, remote, err));
        }
        Ok(())
    }

    async fn open(
        &self,
        bucket: &str,
        remote: &Utf8Path,
    ) -> Result<Box<Reader<'static>>, StorageError> {
        let path = self.path(bucket, remote);
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|err| self.error(bucket, remote, err))?;
        Ok(Box::new(tokio::io::BufReader::new(file)))
    }

    async fn upload(
        &self,
        bucket: &str,
        remote: &Utf8Path,
        local: &mut Reader<'_>,
    ) -> Result<(), StorageError> {
        let path = self.path(bucket, remote);
        let parent = path
            .parent()
            .ok_or_else(|| {
                StorageError::builder(
                    self.name(),
                    StorageErrorKind::InvalidRequest,
                    eyre::eyre!("object path has no parent directory: {path}"),
                )
                .bucket(bucket)
                .path(remote.as_str())
                .build()
            })?
            .to_owned();

        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|err| self.error(bucket, remote, err))?;

        // The temporary path deletes itself when dropped, which covers both
        // failed copies and cancelled futures.
        let (file, staged) = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&parent)
            .map_err(|err| self.error(bucket, remote, err))?
            .into_parts();

        let mut writer = tokio::io::BufWriter::new(tokio::fs::File::from_std(file));

        tokio::io::copy_buf(local, &mut writer)
            .await
            .map_err(|err| self.error(bucket, remote, err))?;

        writer
            .shutdown()
            .await
            .map_err(|err| self.error(bucket, remote, err))?;

        writer
            .into_inner()
            .sync_all()
            .await
            .map_err(|err| self.error(bucket, remote, err))?;

        staged
            .persist(&path)
            .map_err(|err| self.error(bucket, remote, err.error))?;

        tracing::trace!(%path, "committed upload");
        Ok(())
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: Option<&Utf8Path>,
    ) -> Result<Vec<String>, StorageError> {
        let base = self.root.join(bucket);
        let start = match prefix {
            Some(prefix) => base.join(prefix),
            None => base.clone(),
        };

        let mut items = tokio::task::spawn_blocking(move || collect_list(&base, &start))
            .in_current_span()
            .await
            .wrap_err("local driver: listing task")
            .map_err(StorageError::with(self.name(), StorageErrorKind::Other))?
            .map_err(StorageError::with(self.name(), StorageErrorKind::Io))?;

        items.sort();
        tracing::debug!("Found {} entries", items.len());
        Ok(items)
    }
}

#[tracing::instrument(level = "trace")]
fn collect_list(base: &Utf8Path, start: &Utf8Path) -> eyre::Result<Vec<String>> {
    let mut files = Vec::new();
    match start.symlink_metadata() {
        Ok(meta) if meta.is_dir() => visit(start, &mut files)?,
        Ok(_) => files.push(start.to_owned()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err).wrap_err_with(|| format!("stat {start}")),
    }

    Ok(files
        .into_iter()
        .filter(|p| {
            !p.file_name()
                .is_some_and(|name| name.starts_with(TEMP_PREFIX))
        })
        .filter_map(|p| p.strip_prefix(base).ok().map(|p| p.to_string()))
        .collect())
}

fn visit(path: &Utf8Path, files: &mut Vec<Utf8PathBuf>) -> eyre::Result<()> {
    for entry in path
        .read_dir_utf8()
        .wrap_err_with(|| format!("read directory {path}"))?
    {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            visit(entry.path(), files)?;
        } else {
            files.push(entry.path().to_owned())
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt as _;

    use super::*;

    fn driver() -> (tempfile::TempDir, LocalDriver) {
        let dir = tempfile::TempDir::new().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap().to_owned();
        (dir, LocalDriver::new(root))
    }

    #[tokio::test]
    async fn upload_open_delete() {
        let (_dir, driver) = driver();
        let path = Utf8Path::new("team/model/blobs/sha256/abc");

        let mut reader: &[u8] = b"weights";
        driver.upload("registry", path, &mut reader).await.unwrap();
        assert!(driver.root().join("registry").join(path).is_file());

        let mut content = String::new();
        driver
            .open("registry", path)
            .await
            .unwrap()
            .read_to_string(&mut content)
            .await
            .unwrap();
        assert_eq!(content, "weights");
        assert_eq!(driver.metadata("registry", path).await.unwrap().size, 7);

        driver.delete("registry", path).await.unwrap();
        assert!(driver
            .delete("registry", path)
            .await
            .unwrap_err()
            .is_not_found());
        assert!(driver
            .metadata("registry", path)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn directories_are_not_objects() {
        let (_dir, driver) = driver();
        let mut reader: &[u8] = b"weights";
        driver
            .upload("registry", "team/model/blobs/sha256/abc".into(), &mut reader)
            .await
            .unwrap();

        let directory = Utf8Path::new("team/model/blobs");
        assert!(driver
            .metadata("registry", directory)
            .await
            .unwrap_err()
            .is_not_found());
        assert!(driver
            .delete("registry", directory)
            .await
            .unwrap_err()
            .is_not_found());
        assert!(driver.root().join("registry").join(directory).is_dir());
    }

    #[tokio::test]
    async fn failed_upload_leaves_nothing() {
        let (_dir, driver) = driver();
        let path = Utf8Path::new("team/model/blobs/sha256/bad");

        struct Failing;

        impl tokio::io::AsyncRead for Failing {
            fn poll_read(
                self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
                _buf: &mut tokio::io::ReadBuf<'_>,
            ) -> std::task::Poll<std::io::Result<()>> {
                std::task::Poll::Ready(Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "rejected",
                )))
            }
        }

        let mut reader = tokio::io::BufReader::new(Failing);
        let err = driver
            .upload("registry", path, &mut reader)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::InvalidData);

        assert!(!driver.exists("registry", path).await.unwrap());
        assert!(driver
            .list("registry", Some("team/model".into()))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn list_relative_to_bucket() {
        let (_dir, driver) = driver();
        for path in ["a/blobs/sha256/1", "a/blobs/sha256/2", "a/index.json"] {
            let mut reader: &[u8] = b"x";
            driver.upload("r", path.into(), &mut reader).await.unwrap();
        }

        let listed = driver.list("r", Some("a/blobs".into())).await.unwrap();
        assert_eq!(listed, vec!["a/blobs/sha256/1", "a/blobs/sha256/2"]);

        let all = driver.list("r", None).await.unwrap();
        assert_eq!(all.len(), 3);

        assert!(driver
            .list("r", Some("missing".into()))
            .await
            .unwrap()
            .is_empty());
    }
}
