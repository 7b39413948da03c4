use regsweep_domain::{format_bytes, ImageStat, RepositoryName, UsageTable};
use serde::Serialize;
use serde_json::json;

use crate::delete::DeleteMode;
use crate::outcome::ExecutionOutcome;
use crate::sweep::SweepSummary;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageRow {
    /// `None` for the grand total row.
    pub repository: Option<RepositoryName>,
    pub total_size: u64,
    pub linked_size: u64,
    pub detached_size: u64,
    pub linked_percent: f64,
}

impl UsageRow {
    fn new(repository: Option<RepositoryName>, stat: &ImageStat) -> Self {
        Self {
            repository,
            total_size: stat.total_size,
            linked_size: stat.linked_size,
            detached_size: stat.detached_size(),
            linked_percent: stat.linked_percent(),
        }
    }
}

/// One row per repository, largest first.
#[must_use]
pub fn usage_rows(usage: &UsageTable) -> Vec<UsageRow> {
    usage
        .by_total_desc()
        .into_iter()
        .map(|(repository, stat)| UsageRow::new(Some(repository.clone()), stat))
        .collect()
}

#[must_use]
pub fn total_row(usage: &UsageTable) -> UsageRow {
    UsageRow::new(None, &usage.grand_total())
}

/// Status line, exit classification and JSON details for a finished sweep.
#[must_use]
pub fn sweep_outcome(summary: &SweepSummary) -> ExecutionOutcome {
    let detached = &summary.reconciliation.detached;
    let deletion = &summary.deletion;
    let details = json!({
        "mode": deletion.mode,
        "storage_blobs": summary.storage_blobs,
        "shared_blobs": summary.shared_blobs,
        "linked_blobs": summary.references.len(),
        "unsized_blobs": summary.reconciliation.unsized_blobs,
        "complete": summary.references.is_complete(),
        "failures": summary.references.failures(),
        "repositories": usage_rows(&summary.reconciliation.usage),
        "total": total_row(&summary.reconciliation.usage),
        "refused": deletion.refused,
        "deletions": deletion.records,
        "counts": {
            "planned": deletion.planned(),
            "verified": deletion.verified(),
            "unverified": deletion.unverified(),
            "failed": deletion.failed(),
        },
        "planned_bytes": deletion.planned_bytes(),
        "reclaimed_bytes": deletion.reclaimed_bytes(),
    });

    if let Some(reason) = &deletion.refused {
        return ExecutionOutcome::failure(
            format!("{reason} ({} detached blobs left in place)", detached.len()),
            details,
        );
    }
    if !summary.references.is_complete() {
        return ExecutionOutcome::failure(
            format!(
                "reference graph is incomplete; {} detached blobs reported may still be referenced",
                detached.len()
            ),
            details,
        );
    }
    if !deletion.is_clean() {
        return ExecutionOutcome::failure(
            format!(
                "deleted {} of {} detached blobs; {} failed and {} could not be verified",
                deletion.verified(),
                detached.len(),
                deletion.failed(),
                deletion.unverified()
            ),
            details,
        );
    }
    if detached.is_empty() {
        return ExecutionOutcome::success("no detached blobs found", details);
    }
    let message = match deletion.mode {
        DeleteMode::DryRun => format!(
            "dry run: {} detached blobs ({}) would be removed; rerun with --delete",
            detached.len(),
            format_bytes(deletion.planned_bytes())
        ),
        DeleteMode::Live => format!(
            "deleted {} detached blobs ({} reclaimed)",
            deletion.verified(),
            format_bytes(deletion.reclaimed_bytes())
        ),
    };
    ExecutionOutcome::success(message, details)
}
