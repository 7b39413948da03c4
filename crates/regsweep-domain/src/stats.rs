use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::digest::BlobDigest;
use crate::index::StorageEntry;
use crate::repository::RepositoryName;

/// Byte totals for one repository. `linked_size <= total_size` always holds
/// because linked bytes are only ever added together with total bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageStat {
    pub total_size: u64,
    pub linked_size: u64,
}

impl ImageStat {
    pub fn record(&mut self, size: u64, linked: bool) {
        self.total_size += size;
        if linked {
            self.linked_size += size;
        }
    }

    #[must_use]
    pub fn detached_size(&self) -> u64 {
        self.total_size - self.linked_size
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn linked_percent(&self) -> f64 {
        if self.total_size == 0 {
            return 0.0;
        }
        self.linked_size as f64 * 100.0 / self.total_size as f64
    }

    fn merge(&mut self, other: &ImageStat) {
        self.total_size += other.total_size;
        self.linked_size += other.linked_size;
    }
}

/// Per-repository aggregate of [`ImageStat`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageTable {
    repositories: BTreeMap<RepositoryName, ImageStat>,
}

impl UsageTable {
    pub fn accumulate(&mut self, repository: &RepositoryName, size: u64, linked: bool) {
        self.repositories
            .entry(repository.clone())
            .or_default()
            .record(size, linked);
    }

    #[must_use]
    pub fn get(&self, repository: &RepositoryName) -> Option<&ImageStat> {
        self.repositories.get(repository)
    }

    /// Largest consumers first; ties are broken by name so output is stable.
    #[must_use]
    pub fn by_total_desc(&self) -> Vec<(&RepositoryName, &ImageStat)> {
        let mut rows: Vec<_> = self.repositories.iter().collect();
        rows.sort_by(|a, b| {
            b.1.total_size
                .cmp(&a.1.total_size)
                .then_with(|| a.0.cmp(b.0))
        });
        rows
    }

    #[must_use]
    pub fn grand_total(&self) -> ImageStat {
        let mut total = ImageStat::default();
        for stat in self.repositories.values() {
            total.merge(stat);
        }
        total
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}

/// Storage entries whose digest is not reachable from any tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetachedSet {
    blobs: BTreeMap<BlobDigest, StorageEntry>,
}

impl DetachedSet {
    pub(crate) fn insert(&mut self, digest: BlobDigest, entry: StorageEntry) {
        self.blobs.insert(digest, entry);
    }

    #[must_use]
    pub fn contains(&self, digest: &BlobDigest) -> bool {
        self.blobs.contains_key(digest)
    }

    #[must_use]
    pub fn get(&self, digest: &BlobDigest) -> Option<&StorageEntry> {
        self.blobs.get(digest)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BlobDigest, &StorageEntry)> {
        self.blobs.iter()
    }
}

/// Render a byte count with one decimal in binary units.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    fn format_scaled(value: u64, unit: u64, suffix: &str) -> String {
        let whole = value / unit;
        let remainder = value % unit;
        let tenths = (remainder * 10) / unit;
        format!("{whole}.{tenths} {suffix}")
    }

    if bytes >= GB {
        format_scaled(bytes, GB, "GB")
    } else if bytes >= MB {
        format_scaled(bytes, MB, "MB")
    } else if bytes >= KB {
        format_scaled(bytes, KB, "KB")
    } else {
        format!("{bytes} B")
    }
}
