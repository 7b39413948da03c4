use crate::index::{BlobSizes, ReferenceGraph, StorageIndex};
use crate::stats::{DetachedSet, UsageTable};

/// Result of comparing what exists on disk with what the API can reach.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub usage: UsageTable,
    pub detached: DetachedSet,
    /// Blobs left out of the byte totals because their size was unknown or zero.
    pub unsized_blobs: usize,
}

/// Classify every stored blob as linked or detached and aggregate sizes.
///
/// Size only feeds the statistics: a blob whose size is unknown (or zero) is
/// still classified, so it can end up detached without being counted.
#[must_use]
pub fn reconcile(
    storage: &StorageIndex,
    references: &ReferenceGraph,
    sizes: &BlobSizes,
) -> Reconciliation {
    let mut result = Reconciliation::default();
    for (digest, entry) in storage.iter() {
        let linked = references.is_linked(digest);
        match sizes.countable(digest) {
            Some(size) => result.usage.accumulate(&entry.primary, size, linked),
            None => result.unsized_blobs += 1,
        }
        if !linked {
            result.detached.insert(digest.clone(), entry.clone());
        }
    }
    result
}
