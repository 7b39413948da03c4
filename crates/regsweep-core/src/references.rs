use std::collections::HashSet;

use regsweep_domain::{BlobDigest, ReferenceGraph, RepositoryName, TagName};
use tracing::{debug, info, warn};

use crate::client::{ApiError, RegistryApi};

/// Enumerate catalog → tags → manifests and collect every reachable blob.
///
/// Failures are recorded on the returned graph instead of aborting: a
/// repository or tag that cannot be read contributes nothing, everything else
/// is kept, and the graph reports itself incomplete.
pub fn walk_references(api: &dyn RegistryApi) -> ReferenceGraph {
    let mut graph = ReferenceGraph::default();
    let repositories = match api.catalog() {
        Ok(repositories) => repositories,
        Err(err) => {
            warn!(%err, "catalog enumeration failed; reference graph is empty");
            graph.record_failure("catalog", err.to_string());
            return graph;
        }
    };
    info!(repositories = repositories.len(), "walking registry catalog");

    for repository in &repositories {
        walk_repository(api, repository, &mut graph);
    }

    if graph.is_complete() {
        info!(linked = graph.len(), "reference graph built");
    } else {
        warn!(
            linked = graph.len(),
            failures = graph.failures().len(),
            "reference graph is incomplete"
        );
    }
    graph
}

fn walk_repository(api: &dyn RegistryApi, repository: &RepositoryName, graph: &mut ReferenceGraph) {
    let tags = match api.tags(repository) {
        Ok(tags) => tags,
        Err(err) => {
            warn!(%repository, %err, "tag listing failed; skipping repository");
            graph.record_failure(format!("tags of {repository}"), err.to_string());
            return;
        }
    };
    debug!(%repository, tags = tags.len(), "walking tags");

    for tag in tags {
        match tag_blobs(api, repository, &tag) {
            Ok(blobs) => {
                for digest in blobs {
                    graph.link(digest, repository.clone(), tag.clone());
                }
            }
            Err(err) => {
                warn!(%repository, %tag, %err, "manifest fetch failed; skipping tag");
                graph.record_failure(format!("manifest {repository}:{tag}"), err.to_string());
            }
        }
    }
}

/// Blobs referenced by one tag, following manifest lists into their children.
fn tag_blobs(
    api: &dyn RegistryApi,
    repository: &RepositoryName,
    tag: &TagName,
) -> Result<Vec<BlobDigest>, ApiError> {
    let mut blobs = Vec::new();
    let mut visited = HashSet::new();
    let mut pending = vec![tag.as_str().to_string()];
    while let Some(reference) = pending.pop() {
        if !visited.insert(reference.clone()) {
            continue;
        }
        let manifest = api.manifest(repository, &reference)?;
        for raw in manifest.blob_references() {
            match BlobDigest::from_reference(raw) {
                Ok(digest) => blobs.push(digest),
                Err(err) => warn!(%repository, %tag, %err, "ignoring blob reference"),
            }
        }
        for child in manifest.child_manifests() {
            match BlobDigest::from_reference(child) {
                Ok(digest) => pending.push(digest.reference()),
                Err(err) => warn!(%repository, %tag, %err, "ignoring child manifest"),
            }
        }
    }
    Ok(blobs)
}
