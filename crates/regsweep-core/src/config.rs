use std::collections::HashMap;
use std::env;
use std::net::Ipv6Addr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use url::Url;

pub const HOST_ENV: &str = "DOCKER_REGISTRY_HOST";
pub const PORT_ENV: &str = "DOCKER_REGISTRY_PORT";
pub const PATH_ENV: &str = "DOCKER_REGISTRY_PATH";
pub const WORKERS_ENV: &str = "REGSWEEP_WORKERS";
pub const TIMEOUT_ENV: &str = "REGSWEEP_HTTP_TIMEOUT";

pub const DEFAULT_HOST: &str = "registry";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_PATH: &str = "/var/lib/registry";
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

/// Everything one sweep needs to know about its surroundings.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub host: String,
    pub port: u16,
    pub storage_root: PathBuf,
    /// `false` keeps the run report-only.
    pub delete: bool,
    pub workers: usize,
    pub timeout: Duration,
}

impl SweepConfig {
    /// Builds a dry-run configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error if a numeric variable cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_snapshot(&EnvSnapshot::capture())
    }

    pub(crate) fn from_snapshot(snapshot: &EnvSnapshot) -> Result<Self> {
        let port = match snapshot.var(PORT_ENV) {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("{PORT_ENV}={raw} is not a valid port"))?,
            None => DEFAULT_PORT,
        };
        let workers = match snapshot.var(WORKERS_ENV) {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("{WORKERS_ENV}={raw} is not a number"))?,
            None => DEFAULT_WORKERS,
        };
        let timeout_secs = match snapshot.var(TIMEOUT_ENV) {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("{TIMEOUT_ENV}={raw} is not a number of seconds"))?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        Ok(Self {
            host: snapshot.var(HOST_ENV).unwrap_or(DEFAULT_HOST).to_string(),
            port,
            storage_root: PathBuf::from(snapshot.var(PATH_ENV).unwrap_or(DEFAULT_PATH)),
            delete: false,
            workers,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// `http://<host>:<port>/v2/`
    ///
    /// # Errors
    /// Returns an error when the host does not form a valid URL.
    pub fn api_base(&self) -> Result<Url> {
        let host = self.host.trim();
        if host.is_empty() {
            bail!("registry host must not be empty");
        }
        let raw = if host.parse::<Ipv6Addr>().is_ok() {
            format!("http://[{host}]:{}/v2/", self.port)
        } else {
            format!("http://{host}:{}/v2/", self.port)
        };
        let url = Url::parse(&raw).with_context(|| format!("invalid registry address {raw}"))?;
        if url.path() != "/v2/" {
            bail!("registry host '{host}' must not contain a path");
        }
        Ok(url)
    }

    #[must_use]
    pub fn effective_workers(&self) -> usize {
        self.workers.max(1)
    }
}
