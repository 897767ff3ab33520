use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use http::{Method, Uri};
use serde::{Deserialize, Serialize};

/// Which direction a negotiated transfer goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    /// The client will send the object to the location.
    Upload,

    /// The client will fetch the object from the location.
    Download,
}

impl Purpose {
    /// The wire name of this purpose.
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Upload => "upload",
            Purpose::Download => "download",
        }
    }

    /// The HTTP method a client uses against a location with this purpose.
    pub fn method(&self) -> Method {
        match self {
            Purpose::Upload => Method::PUT,
            Purpose::Download => Method::GET,
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`Purpose`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPurpose(String);

impl fmt::Display for UnknownPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown transfer purpose: {:?}", self.0)
    }
}

impl std::error::Error for UnknownPurpose {}

impl FromStr for Purpose {
    type Err = UnknownPurpose;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(Purpose::Upload),
            "download" => Ok(Purpose::Download),
            other => Err(UnknownPurpose(other.to_owned())),
        }
    }
}

/// A request for a direct-transfer location.
///
/// `properties` is an open bag of backend-specific parameters (expiry,
/// multipart, chunking). Drivers ignore keys they do not understand.
#[derive(Debug, Clone, Copy)]
pub struct LocationRequest<'r> {
    /// Transfer direction.
    pub purpose: Purpose,

    /// Backend-specific negotiation parameters.
    pub properties: &'r BTreeMap<String, String>,
}

impl<'r> LocationRequest<'r> {
    /// Create a new location request.
    pub fn new(purpose: Purpose, properties: &'r BTreeMap<String, String>) -> Self {
        Self {
            purpose,
            properties,
        }
    }

    /// Look up a negotiation property.
    pub fn property(&self, key: &str) -> Option<&'r str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// A location granted by a driver for transferring one object directly.
///
/// Granting a location is not evidence that any transfer happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Where the client should send its request.
    pub url: Uri,

    /// Which HTTP method the client should use.
    pub method: Method,

    /// When the location stops being valid, if it expires.
    pub expires: Option<DateTime<Utc>>,

    /// Headers the client must send along.
    pub headers: BTreeMap<String, String>,

    /// Properties the driver settled on during negotiation.
    pub properties: BTreeMap<String, String>,
}

impl Location {
    /// A location at `url` for `purpose`, with nothing else negotiated.
    pub fn new(url: Uri, purpose: Purpose) -> Self {
        Self {
            url,
            method: purpose.method(),
            expires: None,
            headers: BTreeMap::new(),
            properties: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purpose_names() {
        assert_eq!("upload".parse::<Purpose>().unwrap(), Purpose::Upload);
        assert_eq!("download".parse::<Purpose>().unwrap(), Purpose::Download);
        assert!("sideload".parse::<Purpose>().is_err());
        assert_eq!(Purpose::Download.to_string(), "download");
        assert_eq!(Purpose::Upload.method(), Method::PUT);
    }
}
