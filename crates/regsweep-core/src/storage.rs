use regsweep_domain::{
    is_layer_link_path, parse_layer_link, LayoutError, StorageIndex, StorageLayout,
};
use tracing::{debug, info, trace};
use walkdir::WalkDir;

/// Repository subtrees that never hold layer links.
const SKIPPED_DIRS: &[&str] = &["_uploads", "_manifests"];

/// Walk `repositories/` and record every `_layers/sha256/<digest>` directory.
///
/// The walk is sorted by file name, so "first seen" ownership is stable
/// between runs over the same tree.
pub fn build_storage_index(layout: &StorageLayout) -> Result<StorageIndex, LayoutError> {
    let root = layout.repositories_root();
    if !root.is_dir() {
        return Err(LayoutError::MissingRoot {
            path: layout.root().to_path_buf(),
        });
    }
    debug!(root = %root.display(), "indexing layer links");

    let mut index = StorageIndex::default();
    let mut walker = WalkDir::new(&root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(entry.file_type().is_dir()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| SKIPPED_DIRS.contains(&name)))
        });
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|err| LayoutError::Walk {
            path: err
                .path()
                .map_or_else(|| root.clone(), std::path::Path::to_path_buf),
            message: err.to_string(),
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(&root)
            .map_err(|err| LayoutError::Walk {
                path: entry.path().to_path_buf(),
                message: err.to_string(),
            })?;
        if !is_layer_link_path(relative) {
            continue;
        }
        let link = parse_layer_link(relative)?;
        trace!(digest = %link.digest, repository = %link.repository, "layer link");
        index.insert(link);
        // The digest directory only holds the `link` file.
        walker.skip_current_dir();
    }

    info!(
        blobs = index.len(),
        shared = index.shared_count(),
        "blobs parsed from storage"
    );
    Ok(index)
}
