//! Documents stored in the registry: manifests and indices, and the
//! descriptors they are made of.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// Media type of an index document.
pub const MEDIA_TYPE_INDEX: &str = "application/vnd.modelx.model.index.v1.json";

/// Media type of a manifest document.
pub const MEDIA_TYPE_MANIFEST: &str = "application/vnd.modelx.model.manifest.v1.json";

/// Media type of a model configuration blob.
pub const MEDIA_TYPE_CONFIG: &str = "application/vnd.modelx.model.config.v1.yaml";

/// Media type reported for blobs.
pub const MEDIA_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// Describes one piece of content: a blob, a manifest, or a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// File, reference, or repository name, depending on where the
    /// descriptor appears.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Media type of the described content.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_type: String,

    /// Digest of the described content.
    #[serde(default, skip_serializing_if = "Digest::is_empty")]
    pub digest: Digest,

    /// Size of the described content, in bytes.
    #[serde(default)]
    pub size: u64,

    /// Alternative locations of the content.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,

    /// When the content was last written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,

    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// A manifest: the configuration and blobs making up one version of an
/// artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Document schema version.
    pub schema_version: u32,

    /// Media type of this document.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_type: String,

    /// The configuration blob.
    #[serde(default)]
    pub config: Descriptor,

    /// Content blobs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blobs: Vec<Descriptor>,

    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            schema_version: 2,
            media_type: MEDIA_TYPE_MANIFEST.to_owned(),
            config: Descriptor::default(),
            blobs: Vec::new(),
            annotations: BTreeMap::new(),
        }
    }
}

impl Manifest {
    /// The serialized document, exactly as it is stored.
    ///
    /// Serialization is deterministic: fields are written in declaration
    /// order and maps are sorted.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// The SHA-256 digest of the serialized document.
    pub fn digest(&self) -> Result<Digest, serde_json::Error> {
        Ok(Digest::sha256(&self.to_bytes()?))
    }
}

/// A searchable list of descriptors.
///
/// A repository index lists the references in that repository; the global
/// index lists repositories. Entries are kept sorted by name, so pagination
/// over an index is stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    /// Document schema version.
    pub schema_version: u32,

    /// Media type of this document.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_type: String,

    /// Entries, sorted by name.
    #[serde(default)]
    pub manifests: Vec<Descriptor>,

    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Default for Index {
    fn default() -> Self {
        Self {
            schema_version: 2,
            media_type: MEDIA_TYPE_INDEX.to_owned(),
            manifests: Vec::new(),
            annotations: BTreeMap::new(),
        }
    }
}

impl Index {
    /// Whether the index has no entries.
    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &str) -> Option<&Descriptor> {
        self.position(name).ok().map(|i| &self.manifests[i])
    }

    /// Insert an entry, replacing any entry with the same name.
    pub fn upsert(&mut self, descriptor: Descriptor) {
        match self.position(&descriptor.name) {
            Ok(i) => self.manifests[i] = descriptor,
            Err(i) => self.manifests.insert(i, descriptor),
        }
    }

    /// Remove the entry named `name`, returning it if present.
    pub fn remove(&mut self, name: &str) -> Option<Descriptor> {
        self.position(name).ok().map(|i| self.manifests.remove(i))
    }

    /// Keep only entries whose name contains `search`.
    ///
    /// An empty search keeps everything.
    pub fn filtered(mut self, search: &str) -> Self {
        if !search.is_empty() {
            self.manifests.retain(|entry| entry.name.contains(search));
        }
        self
    }

    fn position(&self, name: &str) -> Result<usize, usize> {
        self.manifests
            .binary_search_by(|entry| entry.name.as_str().cmp(name))
    }

    /// Restore the name ordering, e.g. after decoding a document written by
    /// another tool.
    pub(crate) fn sort(&mut self) {
        self.manifests.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> Descriptor {
        Descriptor {
            name: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn index_keeps_entries_sorted() {
        let mut index = Index::default();
        for name in ["v2", "latest", "v1", "v10"] {
            index.upsert(entry(name));
        }
        let names: Vec<_> = index.manifests.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["latest", "v1", "v10", "v2"]);

        let mut replacement = entry("v1");
        replacement.size = 42;
        index.upsert(replacement);
        assert_eq!(index.manifests.len(), 4);
        assert_eq!(index.get("v1").unwrap().size, 42);

        assert!(index.remove("v10").is_some());
        assert!(index.remove("v10").is_none());
        assert!(index.get("v10").is_none());
    }

    #[test]
    fn search_filters_by_substring() {
        let mut index = Index::default();
        for name in ["alice/net", "alice/vision", "bob/net"] {
            index.upsert(entry(name));
        }

        let names = |index: Index| -> Vec<String> {
            index.manifests.into_iter().map(|e| e.name).collect()
        };
        assert_eq!(names(index.clone().filtered("net")), ["alice/net", "bob/net"]);
        assert_eq!(names(index.clone().filtered("")).len(), 3);
        assert!(index.filtered("carol").is_empty());
    }

    #[test]
    fn manifest_json_shape() {
        let manifest = Manifest {
            config: Descriptor {
                name: "modelx.yaml".into(),
                media_type: MEDIA_TYPE_CONFIG.into(),
                digest: Digest::sha256(b"config"),
                size: 6,
                ..Default::default()
            },
            ..Default::default()
        };

        let json: serde_json::Value = serde_json::from_slice(&manifest.to_bytes().unwrap()).unwrap();
        assert_eq!(json["schemaVersion"], 2);
        assert_eq!(json["mediaType"], MEDIA_TYPE_MANIFEST);
        assert_eq!(json["config"]["name"], "modelx.yaml");
        assert!(json.get("blobs").is_none());

        let decoded: Manifest = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, manifest);
        assert_eq!(decoded.digest().unwrap(), manifest.digest().unwrap());
    }
}
