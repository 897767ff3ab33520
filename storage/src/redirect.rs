//! Direct-transfer locations for drivers whose objects are also reachable
//! over HTTP, e.g. a bucket fronted by a static file server or CDN.

use std::collections::BTreeMap;

use camino::Utf8Path;
use chrono::{Duration, Utc};
use http::Uri;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Deserialize;

use storage_driver::{
    Driver, Location, LocationRequest, Metadata, Purpose, Reader, StorageError, StorageErrorKind,
    Writer,
};

/// Characters escaped inside a single path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Property naming the lifetime of a location, in seconds.
pub const EXPIRY_PROPERTY: &str = "expiry";

/// Configuration for [`Redirect`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RedirectConfig {
    /// Base URL under which `<bucket>/<path>` is served.
    #[serde(with = "uri_serde")]
    pub base: Uri,

    /// Whether clients may upload directly to the base URL.
    #[serde(default)]
    pub upload: bool,

    /// Default lifetime of granted locations, in seconds.
    #[serde(default = "default_expiry")]
    pub expiry: u32,
}

fn default_expiry() -> u32 {
    15 * 60
}

mod uri_serde {
    use http::Uri;
    use serde::{Deserialize, Deserializer};

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Uri, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl RedirectConfig {
    /// Redirect downloads to `base`, with the default expiry and no uploads.
    pub fn new(base: Uri) -> Self {
        Self {
            base,
            upload: false,
            expiry: default_expiry(),
        }
    }
}

/// A driver wrapper which grants direct-transfer locations.
///
/// Every object operation is forwarded to the inner driver. Locations point at
/// `<base>/<bucket>/<path>` with each segment percent-encoded, and carry an
/// `expires` query parameter holding the expiry as a unix timestamp.
#[derive(Debug)]
pub struct Redirect<D> {
    driver: D,
    config: RedirectConfig,
}

impl<D> Redirect<D> {
    /// Wrap `driver`.
    pub fn new(driver: D, config: RedirectConfig) -> Self {
        Self { driver, config }
    }

    fn url(&self, bucket: &str, remote: &Utf8Path, query: &str) -> Result<Uri, StorageError> {
        let base = self.config.base.to_string();
        let mut url = base.trim_end_matches('/').to_owned();
        for segment in std::iter::once(bucket).chain(remote.iter()) {
            url.push('/');
            url.extend(utf8_percent_encode(segment, SEGMENT));
        }
        url.push('?');
        url.push_str(query);

        url.parse::<Uri>().map_err(|err| {
            StorageError::builder("redirect", StorageErrorKind::InvalidRequest, err)
                .bucket(bucket)
                .path(remote.as_str())
                .context("building location url")
                .build()
        })
    }
}

#[async_trait::async_trait]
impl<D> Driver for Redirect<D>
where
    D: Driver + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.driver.name()
    }

    async fn delete(&self, bucket: &str, remote: &Utf8Path) -> Result<(), StorageError> {
        self.driver.delete(bucket, remote).await
    }

    async fn metadata(&self, bucket: &str, remote: &Utf8Path) -> Result<Metadata, StorageError> {
        self.driver.metadata(bucket, remote).await
    }

    async fn exists(&self, bucket: &str, remote: &Utf8Path) -> Result<bool, StorageError> {
        self.driver.exists(bucket, remote).await
    }

    async fn open(
        &self,
        bucket: &str,
        remote: &Utf8Path,
    ) -> Result<Box<Reader<'static>>, StorageError> {
        self.driver.open(bucket, remote).await
    }

    async fn upload(
        &self,
        bucket: &str,
        remote: &Utf8Path,
        reader: &mut Reader<'_>,
    ) -> Result<(), StorageError> {
        self.driver.upload(bucket, remote, reader).await
    }

    async fn download(
        &self,
        bucket: &str,
        remote: &Utf8Path,
        writer: &mut Writer<'_>,
    ) -> Result<(), StorageError> {
        self.driver.download(bucket, remote, writer).await
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: Option<&Utf8Path>,
    ) -> Result<Vec<String>, StorageError> {
        self.driver.list(bucket, prefix).await
    }

    #[tracing::instrument(skip(self, request), fields(driver = self.driver.name(), purpose = %request.purpose))]
    async fn location(
        &self,
        bucket: &str,
        remote: &Utf8Path,
        request: LocationRequest<'_>,
    ) -> Result<Option<Location>, StorageError> {
        if request.purpose == Purpose::Upload && !self.config.upload {
            tracing::trace!("direct uploads are disabled");
            return Ok(None);
        }

        let expiry = match request.property(EXPIRY_PROPERTY) {
            Some(raw) => raw.parse::<u32>().map_err(|err| {
                StorageError::builder("redirect", StorageErrorKind::InvalidRequest, err)
                    .bucket(bucket)
                    .path(remote.as_str())
                    .context(format!("invalid {EXPIRY_PROPERTY} property: {raw:?}"))
                    .build()
            })?,
            None => self.config.expiry,
        };

        let expires = Utc::now() + Duration::seconds(i64::from(expiry));
        let url = self.url(bucket, remote, &format!("expires={}", expires.timestamp()))?;

        let mut location = Location::new(url, request.purpose);
        location.expires = Some(expires);
        location.properties = BTreeMap::from([(EXPIRY_PROPERTY.to_owned(), expiry.to_string())]);
        Ok(Some(location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;

    fn redirect(upload: bool) -> Redirect<MemoryStorage> {
        let mut config = RedirectConfig::new(Uri::from_static("https://cdn.example.test/store/"));
        config.upload = upload;
        Redirect::new(MemoryStorage::new(), config)
    }

    #[tokio::test]
    async fn download_location_under_base() {
        let driver = redirect(false);
        let properties = BTreeMap::new();
        let location = driver
            .location(
                "registry",
                "team/model/blobs/sha256/abc".into(),
                LocationRequest::new(Purpose::Download, &properties),
            )
            .await
            .unwrap()
            .expect("download location");

        let url = location.url.to_string();
        assert!(
            url.starts_with("https://cdn.example.test/store/registry/team/model/blobs/sha256/abc?expires="),
            "{url}"
        );
        assert_eq!(location.method, http::Method::GET);
        assert_eq!(location.properties[EXPIRY_PROPERTY], "900");
    }

    #[tokio::test]
    async fn uploads_need_opt_in() {
        let properties = BTreeMap::new();
        let request = LocationRequest::new(Purpose::Upload, &properties);

        let disabled = redirect(false);
        assert!(disabled
            .location("registry", "a/blobs/sha256/abc".into(), request)
            .await
            .unwrap()
            .is_none());

        let enabled = redirect(true);
        let location = enabled
            .location("registry", "a/blobs/sha256/abc".into(), request)
            .await
            .unwrap()
            .expect("upload location");
        assert_eq!(location.method, http::Method::PUT);
    }

    #[tokio::test]
    async fn expiry_property() {
        let driver = redirect(false);
        let properties = BTreeMap::from([(EXPIRY_PROPERTY.to_owned(), "60".to_owned())]);
        let location = driver
            .location(
                "registry",
                "a/blobs/sha256/abc".into(),
                LocationRequest::new(Purpose::Download, &properties),
            )
            .await
            .unwrap()
            .unwrap();
        let expires = location.expires.unwrap();
        assert!(expires <= Utc::now() + Duration::seconds(60));
        assert_eq!(location.properties[EXPIRY_PROPERTY], "60");

        let properties = BTreeMap::from([(EXPIRY_PROPERTY.to_owned(), "soon".to_owned())]);
        let err = driver
            .location(
                "registry",
                "a/blobs/sha256/abc".into(),
                LocationRequest::new(Purpose::Download, &properties),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::InvalidRequest);
    }

    #[test]
    fn segments_are_escaped() {
        let driver = redirect(false);
        let url = driver
            .url("registry", "team/my model/manifests/v1".into(), "expires=0")
            .unwrap();
        assert_eq!(
            url.to_string(),
            "https://cdn.example.test/store/registry/team/my%20model/manifests/v1?expires=0"
        );
    }
}
