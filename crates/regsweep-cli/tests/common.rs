#![allow(dead_code)]

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use httptest::{matchers::*, responders::*, Expectation, Server};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tempfile::TempDir;

pub const ENV_VARS: &[&str] = &[
    "DOCKER_REGISTRY_HOST",
    "DOCKER_REGISTRY_PORT",
    "DOCKER_REGISTRY_PATH",
    "REGSWEEP_WORKERS",
    "REGSWEEP_HTTP_TIMEOUT",
    "NO_COLOR",
];

/// Registry storage tree in a temp dir.
pub struct StorageTree {
    temp: TempDir,
}

impl StorageTree {
    pub fn new() -> Self {
        let temp = tempfile::Builder::new()
            .prefix("regsweep-storage")
            .tempdir()
            .expect("tempdir");
        fs::create_dir_all(temp.path().join("docker/registry/v2/repositories"))
            .expect("repositories dir");
        Self { temp }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Write a blob and link it into `repository`; returns the hex digest.
    pub fn blob(&self, repository: &str, bytes: &[u8]) -> String {
        let hex = hex::encode(Sha256::digest(bytes));
        let data = self.blob_dir(&hex).join("data");
        fs::create_dir_all(data.parent().expect("blob dir")).expect("create blob dir");
        fs::write(&data, bytes).expect("write blob");
        let link = self.link_dir(repository, &hex);
        fs::create_dir_all(&link).expect("create link dir");
        fs::write(link.join("link"), format!("sha256:{hex}")).expect("write link");
        hex
    }

    pub fn blob_dir(&self, hex: &str) -> PathBuf {
        self.root()
            .join("docker/registry/v2/blobs/sha256")
            .join(&hex[..2])
            .join(hex)
    }

    pub fn link_dir(&self, repository: &str, hex: &str) -> PathBuf {
        self.root()
            .join("docker/registry/v2/repositories")
            .join(repository)
            .join("_layers/sha256")
            .join(hex)
    }
}

pub fn serve_catalog(server: &Server, repositories: &[&str]) {
    server.expect(
        Expectation::matching(request::method_path("GET", "/v2/_catalog"))
            .times(..)
            .respond_with(json_encoded(json!({ "repositories": repositories }))),
    );
}

pub fn serve_tags(server: &Server, repository: &str, tags: &[&str]) {
    server.expect(
        Expectation::matching(request::method_path(
            "GET",
            eq(format!("/v2/{repository}/tags/list")),
        ))
        .times(..)
        .respond_with(json_encoded(json!({ "name": repository, "tags": tags }))),
    );
}

pub fn serve_manifest(server: &Server, repository: &str, tag: &str, layers: &[&str]) {
    let layers: Vec<Value> = layers
        .iter()
        .map(|hex| {
            json!({
                "mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip",
                "digest": format!("sha256:{hex}"),
            })
        })
        .collect();
    server.expect(
        Expectation::matching(request::method_path(
            "GET",
            eq(format!("/v2/{repository}/manifests/{tag}")),
        ))
        .times(..)
        .respond_with(json_encoded(json!({
            "schemaVersion": 2,
            "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
            "layers": layers,
        }))),
    );
}

pub fn serve_blob_size(server: &Server, repository: &str, hex: &str, size: usize) {
    server.expect(
        Expectation::matching(request::method_path(
            "HEAD",
            eq(format!("/v2/{repository}/blobs/sha256:{hex}")),
        ))
        .times(..)
        .respond_with(status_code(200).append_header("Content-Length", size.to_string())),
    );
}

/// `regsweep` pointed at `registry`, which may be bound to IPv4 or IPv6.
pub fn regsweep(registry: SocketAddr, storage: &StorageTree) -> Command {
    let mut cmd = cargo_bin_cmd!("regsweep");
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.arg("--host")
        .arg(registry.ip().to_string())
        .arg("--port")
        .arg(registry.port().to_string())
        .arg("--path")
        .arg(storage.root())
        .args(["--timeout", "5", "--no-color"]);
    cmd
}

pub fn parse_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("json envelope on stdout")
}
