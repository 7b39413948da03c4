use serde::Deserialize;

/// Media types sent in the `Accept` header when fetching manifests.
pub const MANIFEST_MEDIA_TYPES: &[&str] = &[
    "application/vnd.docker.distribution.manifest.v2+json",
    "application/vnd.docker.distribution.manifest.list.v2+json",
    "application/vnd.oci.image.manifest.v1+json",
    "application/vnd.oci.image.index.v1+json",
    "application/vnd.docker.distribution.manifest.v1+prettyjws",
    "application/vnd.docker.distribution.manifest.v1+json",
];

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub media_type: Option<String>,
    /// Schema 1 layer list.
    #[serde(default)]
    pub fs_layers: Vec<FsLayer>,
    #[serde(default)]
    pub config: Option<Descriptor>,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
    /// Manifest list / OCI index children.
    #[serde(default)]
    pub manifests: Vec<Descriptor>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FsLayer {
    pub blob_sum: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub digest: String,
    #[serde(default)]
    pub media_type: Option<String>,
}

impl Manifest {
    /// Blob digests this manifest pins in storage, in document order.
    pub fn blob_references(&self) -> impl Iterator<Item = &str> {
        self.fs_layers
            .iter()
            .map(|layer| layer.blob_sum.as_str())
            .chain(self.config.iter().map(|config| config.digest.as_str()))
            .chain(self.layers.iter().map(|layer| layer.digest.as_str()))
    }

    pub fn child_manifests(&self) -> impl Iterator<Item = &str> {
        self.manifests.iter().map(|child| child.digest.as_str())
    }
}
