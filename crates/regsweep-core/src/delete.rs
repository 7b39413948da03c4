use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rayon::ThreadPool;
use regsweep_domain::{
    format_bytes, BlobDigest, BlobSizes, DetachedSet, RepositoryName, StorageEntry, StorageLayout,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::client::RegistryApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeleteMode {
    DryRun,
    Live,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum DeletionStatus {
    /// Dry run, or live deletion was refused for this run.
    Planned,
    Verified,
    /// Removal ran but these paths still exist.
    Unverified { remaining: Vec<String> },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionRecord {
    pub digest: BlobDigest,
    pub repository: RepositoryName,
    pub size: Option<u64>,
    /// `None` when no DELETE was issued.
    pub api_accepted: Option<bool>,
    #[serde(flatten)]
    pub status: DeletionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub mode: DeleteMode,
    /// Why live deletion was not attempted, when it was requested.
    pub refused: Option<String>,
    pub records: Vec<DeletionRecord>,
}

impl DeletionReport {
    fn count(&self, predicate: impl Fn(&DeletionStatus) -> bool) -> usize {
        self.records.iter().filter(|r| predicate(&r.status)).count()
    }

    #[must_use]
    pub fn planned(&self) -> usize {
        self.count(|s| matches!(s, DeletionStatus::Planned))
    }

    #[must_use]
    pub fn verified(&self) -> usize {
        self.count(|s| matches!(s, DeletionStatus::Verified))
    }

    #[must_use]
    pub fn unverified(&self) -> usize {
        self.count(|s| matches!(s, DeletionStatus::Unverified { .. }))
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, DeletionStatus::Failed { .. }))
    }

    /// Bytes behind verified deletions with a known size.
    #[must_use]
    pub fn reclaimed_bytes(&self) -> u64 {
        self.records
            .iter()
            .filter(|r| r.status == DeletionStatus::Verified)
            .filter_map(|r| r.size)
            .sum()
    }

    /// Bytes behind planned deletions with a known size.
    #[must_use]
    pub fn planned_bytes(&self) -> u64 {
        self.records
            .iter()
            .filter(|r| r.status == DeletionStatus::Planned)
            .filter_map(|r| r.size)
            .sum()
    }

    /// No deletion was left half done.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.unverified() == 0 && self.failed() == 0
    }
}

/// Removes detached blobs from the registry API and from disk.
pub struct Deleter<'a> {
    api: &'a dyn RegistryApi,
    layout: &'a StorageLayout,
    mode: DeleteMode,
}

impl<'a> Deleter<'a> {
    pub fn new(api: &'a dyn RegistryApi, layout: &'a StorageLayout, mode: DeleteMode) -> Self {
        Self { api, layout, mode }
    }

    /// Process every detached blob. Blobs run concurrently on `pool`; the
    /// steps for one blob never do.
    pub fn run(&self, detached: &DetachedSet, sizes: &BlobSizes, pool: &ThreadPool) -> DeletionReport {
        let entries: Vec<_> = detached.iter().collect();
        let records: Vec<DeletionRecord> = pool.install(|| {
            entries
                .par_iter()
                .map(|(digest, entry)| self.delete_blob(digest, entry, sizes.get(digest)))
                .collect()
        });
        DeletionReport {
            mode: self.mode,
            refused: None,
            records,
        }
    }

    /// API delete, then data file, blob directory and layer links, then a
    /// check that none of those paths survived.
    pub fn delete_blob(
        &self,
        digest: &BlobDigest,
        entry: &StorageEntry,
        size: Option<u64>,
    ) -> DeletionRecord {
        let repository = &entry.primary;
        match size {
            Some(size) => info!(%digest, %repository, size = %format_bytes(size), "detached blob"),
            None => info!(%digest, %repository, "detached blob (unknown size)"),
        }

        let mut record = DeletionRecord {
            digest: digest.clone(),
            repository: repository.clone(),
            size,
            api_accepted: None,
            status: DeletionStatus::Planned,
        };
        if self.mode == DeleteMode::DryRun {
            return record;
        }

        // Advisory: the registry may refuse (deletes disabled) or already have
        // forgotten the blob; the filesystem removal below is what counts.
        match self.api.delete_blob(repository, digest) {
            Ok(()) => record.api_accepted = Some(true),
            Err(err) => {
                warn!(%digest, %repository, %err, "registry did not accept blob deletion");
                record.api_accepted = Some(false);
            }
        }

        record.status = match self.remove_from_disk(digest, entry) {
            Err(err) => {
                error!(%digest, %err, "failed to remove blob from storage");
                DeletionStatus::Failed {
                    error: err.to_string(),
                }
            }
            Ok(()) => self.verify_removed(digest, entry),
        };
        record
    }

    /// `Verified` only when neither the blob directory nor any layer link
    /// of `entry` is still present.
    fn verify_removed(&self, digest: &BlobDigest, entry: &StorageEntry) -> DeletionStatus {
        let remaining = self.surviving_paths(digest, entry);
        if remaining.is_empty() {
            info!(%digest, repository = %entry.primary, "blob deleted");
            return DeletionStatus::Verified;
        }
        error!(%digest, ?remaining, "blob paths still exist after removal");
        DeletionStatus::Unverified {
            remaining: remaining
                .iter()
                .map(|path| path.display().to_string())
                .collect(),
        }
    }

    fn remove_from_disk(&self, digest: &BlobDigest, entry: &StorageEntry) -> io::Result<()> {
        ignore_missing(fs::remove_file(self.layout.blob_data(digest)))?;
        ignore_missing(fs::remove_dir(self.layout.blob_dir(digest)))?;
        for owner in &entry.owners {
            ignore_missing(fs::remove_dir_all(self.layout.layer_link_dir(owner, digest)))?;
        }
        Ok(())
    }

    fn surviving_paths(&self, digest: &BlobDigest, entry: &StorageEntry) -> Vec<PathBuf> {
        std::iter::once(self.layout.blob_dir(digest))
            .chain(
                entry
                    .owners
                    .iter()
                    .map(|owner| self.layout.layer_link_dir(owner, digest)),
            )
            .filter(|path| exists(path))
            .collect()
    }
}

fn ignore_missing(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn exists(path: &Path) -> bool {
    // symlink_metadata so a dangling link still counts as present.
    fs::symlink_metadata(path).is_ok()
}
