//! On-disk layout of the registry's filesystem storage driver.
//!
//! ```text
//! <root>/docker/registry/v2/repositories/<name>/_layers/sha256/<digest>/link
//! <root>/docker/registry/v2/blobs/sha256/<digest[0..2]>/<digest>/data
//! ```

use std::path::{Component, Path, PathBuf};

use crate::digest::{BlobDigest, DigestError};
use crate::repository::RepositoryName;

pub const REGISTRY_PREFIX: &str = "docker/registry/v2";
pub const LAYERS_SEGMENT: &str = "_layers";
pub const ALGORITHM_SEGMENT: &str = "sha256";
pub const BLOB_DATA_FILE: &str = "data";

/// Shape violations in the storage tree. These indicate a storage driver
/// version mismatch and are never recovered from.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("storage root {path} does not contain a repositories directory")]
    MissingRoot { path: PathBuf },
    #[error("layer link {path} is too shallow; expected <name>/_layers/sha256/<digest>")]
    TooShallow { path: PathBuf },
    #[error("layer link {path}: expected segment '{expected}', found '{found}'")]
    UnexpectedSegment {
        path: PathBuf,
        expected: &'static str,
        found: String,
    },
    #[error("layer link {path}: repository segment '{segment}' is reserved")]
    ReservedSegment { path: PathBuf, segment: String },
    #[error("layer link {path}: {source}")]
    InvalidDigest {
        path: PathBuf,
        #[source]
        source: DigestError,
    },
    #[error("layer link {path} is not valid UTF-8")]
    NonUtf8 { path: PathBuf },
    #[error("failed to walk {path}: {message}")]
    Walk { path: PathBuf, message: String },
}

/// A parsed `<name>/_layers/sha256/<digest>` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerLink {
    pub digest: BlobDigest,
    pub repository: RepositoryName,
}

/// Parse a layer-link directory path relative to the repositories root.
///
/// The digest is the trailing segment and the repository name is everything
/// before `_layers`. For single-segment names that is the fourth component
/// from the end; namespaced names keep all of their segments.
pub fn parse_layer_link(relative: &Path) -> Result<LayerLink, LayoutError> {
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => match part.to_str() {
                Some(part) => segments.push(part),
                None => {
                    return Err(LayoutError::NonUtf8 {
                        path: relative.to_path_buf(),
                    })
                }
            },
            Component::CurDir => {}
            _ => {
                return Err(LayoutError::UnexpectedSegment {
                    path: relative.to_path_buf(),
                    expected: "<relative path>",
                    found: component.as_os_str().to_string_lossy().into_owned(),
                })
            }
        }
    }

    let [name @ .., layers, algorithm, digest] = segments.as_slice() else {
        return Err(LayoutError::TooShallow {
            path: relative.to_path_buf(),
        });
    };
    if name.is_empty() {
        return Err(LayoutError::TooShallow {
            path: relative.to_path_buf(),
        });
    }
    expect_segment(relative, LAYERS_SEGMENT, layers)?;
    expect_segment(relative, ALGORITHM_SEGMENT, algorithm)?;
    if let Some(reserved) = name.iter().find(|segment| segment.starts_with('_')) {
        return Err(LayoutError::ReservedSegment {
            path: relative.to_path_buf(),
            segment: (*reserved).to_string(),
        });
    }

    let digest = BlobDigest::from_hex(digest).map_err(|source| LayoutError::InvalidDigest {
        path: relative.to_path_buf(),
        source,
    })?;
    Ok(LayerLink {
        digest,
        repository: RepositoryName::new(name.join("/")),
    })
}

fn expect_segment(path: &Path, expected: &'static str, found: &str) -> Result<(), LayoutError> {
    if found == expected {
        Ok(())
    } else {
        Err(LayoutError::UnexpectedSegment {
            path: path.to_path_buf(),
            expected,
            found: found.to_string(),
        })
    }
}

/// True when `relative` sits inside a `_layers/sha256/` namespace.
pub fn is_layer_link_path(relative: &Path) -> bool {
    let mut previous: Option<&std::ffi::OsStr> = None;
    let mut components = relative.components().peekable();
    while let Some(component) = components.next() {
        let part = component.as_os_str();
        if previous.is_some_and(|prev| prev == LAYERS_SEGMENT)
            && part == ALGORITHM_SEGMENT
            && components.peek().is_some()
        {
            return true;
        }
        previous = Some(part);
    }
    false
}

#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn registry_root(&self) -> PathBuf {
        self.root.join(REGISTRY_PREFIX)
    }

    #[must_use]
    pub fn repositories_root(&self) -> PathBuf {
        self.registry_root().join("repositories")
    }

    #[must_use]
    pub fn blob_dir(&self, digest: &BlobDigest) -> PathBuf {
        self.registry_root()
            .join("blobs")
            .join(ALGORITHM_SEGMENT)
            .join(digest.shard())
            .join(digest.hex())
    }

    #[must_use]
    pub fn blob_data(&self, digest: &BlobDigest) -> PathBuf {
        self.blob_dir(digest).join(BLOB_DATA_FILE)
    }

    #[must_use]
    pub fn layer_link_dir(&self, repository: &RepositoryName, digest: &BlobDigest) -> PathBuf {
        let mut path = self.repositories_root();
        for segment in repository.as_str().split('/') {
            path.push(segment);
        }
        path.join(LAYERS_SEGMENT)
            .join(ALGORITHM_SEGMENT)
            .join(digest.hex())
    }
}
