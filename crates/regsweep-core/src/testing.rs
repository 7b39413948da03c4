use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::sync::Mutex;

use rayon::{ThreadPool, ThreadPoolBuilder};
use regsweep_domain::{BlobDigest, RepositoryName, StorageLayout, TagName};
use sha2::{Digest, Sha256};
use tempfile::TempDir;

use crate::client::{ApiError, RegistryApi};
use crate::manifest::{Descriptor, Manifest};

pub(crate) fn digest_of(bytes: &[u8]) -> BlobDigest {
    BlobDigest::from_hex(&hex::encode(Sha256::digest(bytes))).unwrap()
}

pub(crate) fn pool(threads: usize) -> ThreadPool {
    ThreadPoolBuilder::new().num_threads(threads).build().unwrap()
}

/// A registry storage tree under a temporary directory.
pub(crate) struct StorageFixture {
    _temp: TempDir,
    layout: StorageLayout,
}

impl StorageFixture {
    pub(crate) fn new() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(temp.path());
        fs::create_dir_all(layout.repositories_root()).unwrap();
        Self {
            _temp: temp,
            layout,
        }
    }

    pub(crate) fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Store `bytes` as a blob and link it as a layer of `repository`.
    pub(crate) fn blob(&self, repository: &str, bytes: &[u8]) -> BlobDigest {
        let digest = self.write_data(bytes);
        self.link(repository, &digest);
        digest
    }

    pub(crate) fn link(&self, repository: &str, digest: &BlobDigest) {
        let dir = self
            .layout
            .layer_link_dir(&RepositoryName::new(repository), digest);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("link"), digest.reference()).unwrap();
    }

    pub(crate) fn manifest_revision(&self, repository: &str, bytes: &[u8]) -> BlobDigest {
        let digest = self.write_data(bytes);
        let dir = self
            .layout
            .repositories_root()
            .join(repository)
            .join("_manifests/revisions/sha256")
            .join(digest.hex());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("link"), digest.reference()).unwrap();
        digest
    }

    pub(crate) fn upload(&self, repository: &str, id: &str) {
        let dir = self
            .layout
            .repositories_root()
            .join(repository)
            .join("_uploads")
            .join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("data"), b"partial").unwrap();
    }

    fn write_data(&self, bytes: &[u8]) -> BlobDigest {
        let digest = digest_of(bytes);
        fs::create_dir_all(self.layout.blob_dir(&digest)).unwrap();
        fs::write(self.layout.blob_data(&digest), bytes).unwrap();
        digest
    }
}

/// In-memory registry API.
#[derive(Default)]
pub(crate) struct FakeRegistry {
    repositories: BTreeSet<String>,
    tags: BTreeMap<String, Vec<String>>,
    manifests: BTreeMap<(String, String), Manifest>,
    blobs: BTreeMap<(String, BlobDigest), u64>,
    failing_catalog: bool,
    failing_tags: HashSet<String>,
    failing_manifests: HashSet<(String, String)>,
    rejecting_deletes: bool,
    deleted: Mutex<Vec<(String, BlobDigest)>>,
}

fn descriptor(digest: &BlobDigest) -> Descriptor {
    Descriptor {
        digest: digest.reference(),
        media_type: None,
    }
}

fn status(method: &'static str, url: String, status: u16) -> ApiError {
    ApiError::Status {
        method,
        url,
        status,
    }
}

impl FakeRegistry {
    fn add_tag(&mut self, repository: &str, tag: &str, manifest: Manifest) {
        self.repositories.insert(repository.to_string());
        self.tags
            .entry(repository.to_string())
            .or_default()
            .push(tag.to_string());
        self.manifests
            .insert((repository.to_string(), tag.to_string()), manifest);
    }

    pub(crate) fn with_tag(mut self, repository: &str, tag: &str, layers: &[&BlobDigest]) -> Self {
        let manifest = Manifest {
            schema_version: Some(2),
            layers: layers.iter().map(|d| descriptor(d)).collect(),
            ..Manifest::default()
        };
        self.add_tag(repository, tag, manifest);
        self
    }

    pub(crate) fn with_index(mut self, repository: &str, tag: &str, children: &[&BlobDigest]) -> Self {
        let manifest = Manifest {
            schema_version: Some(2),
            manifests: children.iter().map(|d| descriptor(d)).collect(),
            ..Manifest::default()
        };
        self.add_tag(repository, tag, manifest);
        self
    }

    pub(crate) fn with_manifest_digest(
        mut self,
        repository: &str,
        digest: &BlobDigest,
        layers: &[&BlobDigest],
    ) -> Self {
        let manifest = Manifest {
            schema_version: Some(2),
            layers: layers.iter().map(|d| descriptor(d)).collect(),
            ..Manifest::default()
        };
        self.manifests
            .insert((repository.to_string(), digest.reference()), manifest);
        self
    }

    pub(crate) fn with_blob(mut self, repository: &str, digest: &BlobDigest, size: u64) -> Self {
        self.blobs
            .insert((repository.to_string(), digest.clone()), size);
        self
    }

    pub(crate) fn failing_catalog(mut self) -> Self {
        self.failing_catalog = true;
        self
    }

    pub(crate) fn failing_tags(mut self, repository: &str) -> Self {
        self.failing_tags.insert(repository.to_string());
        self
    }

    pub(crate) fn failing_manifest(mut self, repository: &str, tag: &str) -> Self {
        self.failing_manifests
            .insert((repository.to_string(), tag.to_string()));
        self
    }

    pub(crate) fn rejecting_deletes(mut self) -> Self {
        self.rejecting_deletes = true;
        self
    }

    pub(crate) fn deleted(&self) -> Vec<(String, BlobDigest)> {
        self.deleted.lock().unwrap().clone()
    }
}

impl RegistryApi for FakeRegistry {
    fn catalog(&self) -> Result<Vec<RepositoryName>, ApiError> {
        if self.failing_catalog {
            return Err(status("GET", "/v2/_catalog".into(), 500));
        }
        Ok(self.repositories.iter().map(RepositoryName::new).collect())
    }

    fn tags(&self, repository: &RepositoryName) -> Result<Vec<TagName>, ApiError> {
        if self.failing_tags.contains(repository.as_str()) {
            return Err(status("GET", format!("/v2/{repository}/tags/list"), 500));
        }
        Ok(self
            .tags
            .get(repository.as_str())
            .map(|tags| tags.iter().map(TagName::new).collect())
            .unwrap_or_default())
    }

    fn manifest(&self, repository: &RepositoryName, reference: &str) -> Result<Manifest, ApiError> {
        let key = (repository.to_string(), reference.to_string());
        if self.failing_manifests.contains(&key) {
            return Err(status("GET", format!("/v2/{repository}/manifests/{reference}"), 500));
        }
        self.manifests
            .get(&key)
            .cloned()
            .ok_or_else(|| status("GET", format!("/v2/{repository}/manifests/{reference}"), 404))
    }

    fn blob_size(&self, repository: &RepositoryName, digest: &BlobDigest) -> Result<u64, ApiError> {
        self.blobs
            .get(&(repository.to_string(), digest.clone()))
            .copied()
            .ok_or_else(|| status("HEAD", format!("/v2/{repository}/blobs/{digest}"), 404))
    }

    fn delete_blob(&self, repository: &RepositoryName, digest: &BlobDigest) -> Result<(), ApiError> {
        if self.rejecting_deletes {
            return Err(status("DELETE", format!("/v2/{repository}/blobs/{digest}"), 405));
        }
        self.deleted
            .lock()
            .unwrap()
            .push((repository.to_string(), digest.clone()));
        Ok(())
    }
}
