#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions
)]

pub mod client;
pub mod config;
pub mod delete;
pub mod manifest;
pub mod oracle;
pub mod outcome;
pub mod references;
pub mod report;
pub mod storage;
pub mod sweep;

#[cfg(test)]
pub(crate) mod testing;

pub use regsweep_domain as domain;
pub use regsweep_domain::{
    format_bytes, BlobDigest, DetachedSet, EnumerationFailure, ImageStat, LayoutError,
    ReferenceGraph, RepositoryName, StorageIndex, StorageLayout, UsageTable,
};

pub use crate::client::{ApiError, HttpRegistry, RegistryApi};
pub use crate::config::SweepConfig;
pub use crate::delete::{DeleteMode, Deleter, DeletionRecord, DeletionReport, DeletionStatus};
pub use crate::oracle::SizeOracle;
pub use crate::outcome::{CommandStatus, ExecutionOutcome};
pub use crate::references::walk_references;
pub use crate::report::{sweep_outcome, total_row, usage_rows, UsageRow};
pub use crate::storage::build_storage_index;
pub use crate::sweep::{run_sweep, sweep, SweepSummary};
