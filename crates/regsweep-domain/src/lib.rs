#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod digest;
pub mod index;
pub mod layout;
pub mod reconcile;
pub mod repository;
pub mod stats;

pub use digest::{BlobDigest, DigestError, SHA256_PREFIX};
pub use index::{
    BlobSizes, EnumerationFailure, ReferenceEntry, ReferenceGraph, StorageEntry, StorageIndex,
};
pub use layout::{is_layer_link_path, parse_layer_link, LayerLink, LayoutError, StorageLayout};
pub use reconcile::{reconcile, Reconciliation};
pub use repository::{RepositoryName, TagName};
pub use stats::{format_bytes, DetachedSet, ImageStat, UsageTable};
