use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::digest::BlobDigest;
use crate::layout::LayerLink;
use crate::repository::{RepositoryName, TagName};

/// Repositories that file a layer link for one digest.
///
/// `primary` is the first repository seen by the walk and carries the blob's
/// storage cost; `owners` lists every repository in walk order, primary first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntry {
    pub primary: RepositoryName,
    pub owners: Vec<RepositoryName>,
}

impl StorageEntry {
    fn new(primary: RepositoryName) -> Self {
        Self {
            owners: vec![primary.clone()],
            primary,
        }
    }

    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.owners.len() > 1
    }
}

/// Every blob that physically exists, keyed by digest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageIndex {
    entries: BTreeMap<BlobDigest, StorageEntry>,
}

impl StorageIndex {
    /// Record a layer link. The first repository seen for a digest stays primary.
    pub fn insert(&mut self, link: LayerLink) {
        match self.entries.get_mut(&link.digest) {
            Some(entry) => {
                if !entry.owners.contains(&link.repository) {
                    entry.owners.push(link.repository);
                }
            }
            None => {
                self.entries
                    .insert(link.digest, StorageEntry::new(link.repository));
            }
        }
    }

    #[must_use]
    pub fn get(&self, digest: &BlobDigest) -> Option<&StorageEntry> {
        self.entries.get(digest)
    }

    #[must_use]
    pub fn contains(&self, digest: &BlobDigest) -> bool {
        self.entries.contains_key(digest)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BlobDigest, &StorageEntry)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn shared_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_shared()).count()
    }
}

impl FromIterator<LayerLink> for StorageIndex {
    fn from_iter<T: IntoIterator<Item = LayerLink>>(iter: T) -> Self {
        let mut index = Self::default();
        for link in iter {
            index.insert(link);
        }
        index
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub repository: RepositoryName,
    pub tag: TagName,
}

/// A catalog, tag listing or manifest call that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerationFailure {
    pub scope: String,
    pub message: String,
}

/// Blobs reachable from a tag, as observed through the API during this run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceGraph {
    entries: BTreeMap<BlobDigest, ReferenceEntry>,
    failures: Vec<EnumerationFailure>,
}

impl ReferenceGraph {
    /// Last writer wins; only reachability matters, not which tag is kept.
    pub fn link(&mut self, digest: BlobDigest, repository: RepositoryName, tag: TagName) {
        self.entries
            .insert(digest, ReferenceEntry { repository, tag });
    }

    pub fn record_failure(&mut self, scope: impl Into<String>, message: impl Into<String>) {
        self.failures.push(EnumerationFailure {
            scope: scope.into(),
            message: message.into(),
        });
    }

    #[must_use]
    pub fn is_linked(&self, digest: &BlobDigest) -> bool {
        self.entries.contains_key(digest)
    }

    #[must_use]
    pub fn get(&self, digest: &BlobDigest) -> Option<&ReferenceEntry> {
        self.entries.get(digest)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    #[must_use]
    pub fn failures(&self) -> &[EnumerationFailure] {
        &self.failures
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BlobDigest, &ReferenceEntry)> {
        self.entries.iter()
    }
}

/// Sizes resolved by HEAD requests; `None` means the registry could not say.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobSizes {
    sizes: BTreeMap<BlobDigest, Option<u64>>,
}

impl BlobSizes {
    pub fn insert(&mut self, digest: BlobDigest, size: Option<u64>) {
        self.sizes.insert(digest, size);
    }

    /// Known, non-zero size. Zero-length answers count as unknown.
    #[must_use]
    pub fn countable(&self, digest: &BlobDigest) -> Option<u64> {
        self.sizes.get(digest).copied().flatten().filter(|s| *s > 0)
    }

    #[must_use]
    pub fn get(&self, digest: &BlobDigest) -> Option<u64> {
        self.sizes.get(digest).copied().flatten()
    }

    #[must_use]
    pub fn unknown_count(&self) -> usize {
        self.sizes.values().filter(|s| s.is_none()).count()
    }
}

impl FromIterator<(BlobDigest, Option<u64>)> for BlobSizes {
    fn from_iter<T: IntoIterator<Item = (BlobDigest, Option<u64>)>>(iter: T) -> Self {
        Self {
            sizes: iter.into_iter().collect(),
        }
    }
}
