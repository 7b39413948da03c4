use rayon::prelude::*;
use rayon::ThreadPool;
use regsweep_domain::{BlobDigest, BlobSizes, StorageEntry, StorageIndex};
use tracing::{debug, info};

use crate::client::RegistryApi;

/// Resolves blob sizes through HEAD requests without ever failing the run.
pub struct SizeOracle<'a> {
    api: &'a dyn RegistryApi,
}

impl<'a> SizeOracle<'a> {
    pub fn new(api: &'a dyn RegistryApi) -> Self {
        Self { api }
    }

    /// Size of `digest` as reported under one of its owning repositories.
    ///
    /// The primary owner is asked first; a 404 there is normal when the blob
    /// was filed under several repositories, so the other owners are tried
    /// before giving up.
    pub fn blob_size(&self, digest: &BlobDigest, entry: &StorageEntry) -> Option<u64> {
        for repository in &entry.owners {
            match self.api.blob_size(repository, digest) {
                Ok(size) => return Some(size),
                Err(err) => {
                    debug!(%digest, %repository, %err, "blob size unavailable");
                }
            }
        }
        None
    }

    /// Look up every stored blob on `pool`.
    pub fn resolve(&self, storage: &StorageIndex, pool: &ThreadPool) -> BlobSizes {
        let entries: Vec<_> = storage.iter().collect();
        let resolved: Vec<_> = pool.install(|| {
            entries
                .par_iter()
                .map(|(digest, entry)| ((*digest).clone(), self.blob_size(digest, entry)))
                .collect()
        });
        let sizes: BlobSizes = resolved.into_iter().collect();
        info!(
            blobs = storage.len(),
            unknown = sizes.unknown_count(),
            "blob sizes resolved"
        );
        sizes
    }
}
