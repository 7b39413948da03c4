//! Blocking client for the registry v2 HTTP API.

use std::time::Duration;

use regsweep_domain::{BlobDigest, RepositoryName, TagName};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_LENGTH, LINK};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, trace};
use url::Url;

use crate::manifest::{Manifest, MANIFEST_MEDIA_TYPES};

/// Upper bound on followed `Link: rel="next"` pages for one listing.
const MAX_PAGES: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{method} {url} timed out")]
    Timeout { method: &'static str, url: String },
    #[error("{method} {url} failed: {source}")]
    Transport {
        method: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} {url} returned HTTP {status}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
    },
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("{url} did not report a usable Content-Length")]
    MissingLength { url: String },
    #[error("invalid request URL: {0}")]
    Url(String),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("{url} kept paginating past the page limit")]
    Pagination { url: String },
}

impl ApiError {
    fn transport(method: &'static str, url: &Url, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                method,
                url: url.to_string(),
            }
        } else {
            Self::Transport {
                method,
                url: url.to_string(),
                source,
            }
        }
    }

    /// HTTP status returned by the registry, if the request got that far.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The registry calls a sweep depends on.
///
/// `Sync` because size lookups and deletions fan out over a thread pool.
pub trait RegistryApi: Send + Sync {
    fn catalog(&self) -> Result<Vec<RepositoryName>, ApiError>;
    fn tags(&self, repository: &RepositoryName) -> Result<Vec<TagName>, ApiError>;
    /// `reference` is a tag or an algorithm-qualified digest.
    fn manifest(&self, repository: &RepositoryName, reference: &str)
        -> Result<Manifest, ApiError>;
    fn blob_size(&self, repository: &RepositoryName, digest: &BlobDigest)
        -> Result<u64, ApiError>;
    /// Succeeds only on `202 Accepted`.
    fn delete_blob(&self, repository: &RepositoryName, digest: &BlobDigest)
        -> Result<(), ApiError>;
}

#[derive(Debug, Deserialize)]
struct CatalogPage {
    #[serde(default)]
    repositories: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TagsPage {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct HttpRegistry {
    client: Client,
    base: Url,
}

impl HttpRegistry {
    /// `base` must be the `/v2/` endpoint, e.g. `http://registry:5000/v2/`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base: Url, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(format!("regsweep/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| ApiError::Client(err.to_string()))?;
        Ok(Self { client, base })
    }

    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path)
            .map_err(|err| ApiError::Url(format!("{path}: {err}")))
    }

    fn blob_url(&self, repository: &RepositoryName, digest: &BlobDigest) -> Result<Url, ApiError> {
        self.endpoint(&format!("{repository}/blobs/{}", digest.reference()))
    }

    fn send(
        method: &'static str,
        url: &Url,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<Response, ApiError> {
        trace!(method, %url, "registry request");
        request
            .send()
            .map_err(|err| ApiError::transport(method, url, err))
    }

    fn expect_success(method: &'static str, url: &Url, response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ApiError::Status {
                method,
                url: url.to_string(),
                status: response.status().as_u16(),
            })
        }
    }

    fn decode<T: DeserializeOwned>(url: &Url, response: Response) -> Result<T, ApiError> {
        response.json().map_err(|err| ApiError::Decode {
            url: url.to_string(),
            message: err.to_string(),
        })
    }

    /// GET `first` and every page linked from it through `rel="next"`.
    fn get_paginated<T: DeserializeOwned>(
        &self,
        first: Url,
        mut each: impl FnMut(T),
    ) -> Result<(), ApiError> {
        let mut next = Some(first);
        let mut pages = 0usize;
        while let Some(url) = next.take() {
            pages += 1;
            if pages > MAX_PAGES {
                return Err(ApiError::Pagination {
                    url: url.to_string(),
                });
            }
            let response = Self::send("GET", &url, self.client.get(url.clone()))?;
            let response = Self::expect_success("GET", &url, response)?;
            next = next_page(&url, response.headers());
            each(Self::decode(&url, response)?);
        }
        Ok(())
    }
}

impl RegistryApi for HttpRegistry {
    fn catalog(&self) -> Result<Vec<RepositoryName>, ApiError> {
        let mut repositories = Vec::new();
        self.get_paginated(self.endpoint("_catalog")?, |page: CatalogPage| {
            repositories.extend(
                page.repositories
                    .unwrap_or_default()
                    .into_iter()
                    .map(RepositoryName::new),
            );
        })?;
        debug!(count = repositories.len(), "catalog listed");
        Ok(repositories)
    }

    fn tags(&self, repository: &RepositoryName) -> Result<Vec<TagName>, ApiError> {
        let mut tags = Vec::new();
        self.get_paginated(
            self.endpoint(&format!("{repository}/tags/list"))?,
            |page: TagsPage| {
                tags.extend(page.tags.unwrap_or_default().into_iter().map(TagName::new));
            },
        )?;
        debug!(%repository, count = tags.len(), "tags listed");
        Ok(tags)
    }

    fn manifest(
        &self,
        repository: &RepositoryName,
        reference: &str,
    ) -> Result<Manifest, ApiError> {
        let url = self.endpoint(&format!("{repository}/manifests/{reference}"))?;
        let request = self
            .client
            .get(url.clone())
            .header(ACCEPT, MANIFEST_MEDIA_TYPES.join(", "));
        let response = Self::send("GET", &url, request)?;
        let response = Self::expect_success("GET", &url, response)?;
        Self::decode(&url, response)
    }

    fn blob_size(&self, repository: &RepositoryName, digest: &BlobDigest) -> Result<u64, ApiError> {
        let url = self.blob_url(repository, digest)?;
        let response = Self::send("HEAD", &url, self.client.head(url.clone()))?;
        let response = Self::expect_success("HEAD", &url, response)?;
        // Read the header itself: the body of a HEAD response is always empty.
        response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok())
            .ok_or(ApiError::MissingLength {
                url: url.to_string(),
            })
    }

    fn delete_blob(
        &self,
        repository: &RepositoryName,
        digest: &BlobDigest,
    ) -> Result<(), ApiError> {
        let url = self.blob_url(repository, digest)?;
        let response = Self::send("DELETE", &url, self.client.delete(url.clone()))?;
        if response.status() == StatusCode::ACCEPTED {
            Ok(())
        } else {
            Err(ApiError::Status {
                method: "DELETE",
                url: url.to_string(),
                status: response.status().as_u16(),
            })
        }
    }
}

/// Resolve the `rel="next"` target of an RFC 5988 `Link` header.
fn next_page(current: &Url, headers: &HeaderMap) -> Option<Url> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(|link| {
            let mut parts = link.split(';');
            let target = parts.next()?.trim();
            let is_next = parts.any(|param| {
                let param = param.trim();
                param == "rel=\"next\"" || param == "rel=next"
            });
            if !is_next {
                return None;
            }
            let target = target.strip_prefix('<')?.strip_suffix('>')?;
            current.join(target).ok()
        })
}
