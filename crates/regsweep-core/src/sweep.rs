use anyhow::{Context, Result};
use rayon::{ThreadPool, ThreadPoolBuilder};
use regsweep_domain::{reconcile, ReferenceGraph, Reconciliation, StorageLayout};
use tracing::{info, warn};

use crate::client::{HttpRegistry, RegistryApi};
use crate::config::SweepConfig;
use crate::delete::{DeleteMode, Deleter, DeletionReport};
use crate::oracle::SizeOracle;
use crate::references::walk_references;
use crate::storage::build_storage_index;

pub(crate) const INCOMPLETE_REFUSAL: &str =
    "reference graph is incomplete; live deletion skipped to avoid removing reachable blobs";

/// Everything one run observed and did.
#[derive(Debug, Clone)]
pub struct SweepSummary {
    pub storage_blobs: usize,
    pub shared_blobs: usize,
    pub references: ReferenceGraph,
    pub reconciliation: Reconciliation,
    pub deletion: DeletionReport,
}

impl SweepSummary {
    /// The detached set was computed from a full reference graph and every
    /// attempted deletion was verified.
    #[must_use]
    pub fn is_trustworthy(&self) -> bool {
        self.references.is_complete() && self.deletion.is_clean()
    }
}

/// Run a sweep against the registry described by `config`.
///
/// # Errors
/// Fails on invalid configuration or when the storage tree does not have the
/// expected layout.
pub fn sweep(config: &SweepConfig) -> Result<SweepSummary> {
    let base = config.api_base()?;
    let api = HttpRegistry::new(base, config.timeout).context("failed to set up registry client")?;
    let layout = StorageLayout::new(&config.storage_root);
    let mode = if config.delete {
        DeleteMode::Live
    } else {
        DeleteMode::DryRun
    };
    info!(
        registry = %api.base(),
        storage = %layout.root().display(),
        ?mode,
        "starting sweep"
    );
    run_sweep(&api, &layout, mode, config.effective_workers())
}

/// Storage index, reference walk, size lookup, reconciliation, deletion.
///
/// # Errors
/// Fails when the worker pool cannot start or the storage layout is invalid.
pub fn run_sweep(
    api: &dyn RegistryApi,
    layout: &StorageLayout,
    mode: DeleteMode,
    workers: usize,
) -> Result<SweepSummary> {
    let pool = worker_pool(workers)?;

    // Index storage before walking the API so the index is never the newer view.
    let storage = build_storage_index(layout).context("storage layout check failed")?;
    let references = walk_references(api);
    let sizes = SizeOracle::new(api).resolve(&storage, &pool);
    let reconciliation = reconcile(&storage, &references, &sizes);
    info!(
        detached = reconciliation.detached.len(),
        unsized = reconciliation.unsized_blobs,
        "reconciled storage against references"
    );

    let refuse = mode == DeleteMode::Live && !references.is_complete();
    let effective = if refuse {
        warn!("{INCOMPLETE_REFUSAL}");
        DeleteMode::DryRun
    } else {
        mode
    };
    let mut deletion =
        Deleter::new(api, layout, effective).run(&reconciliation.detached, &sizes, &pool);
    if refuse {
        deletion.mode = mode;
        deletion.refused = Some(INCOMPLETE_REFUSAL.to_string());
    }

    Ok(SweepSummary {
        storage_blobs: storage.len(),
        shared_blobs: storage.shared_count(),
        references,
        reconciliation,
        deletion,
    })
}

fn worker_pool(workers: usize) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|index| format!("regsweep-worker-{index}"))
        .build()
        .context("failed to start worker pool")
}
