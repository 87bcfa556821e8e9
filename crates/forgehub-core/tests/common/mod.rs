#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use forgehub_core::archive::ArchiveWriter;
use forgehub_core::{HttpClient, HttpError, ModuleBuffer};
use forgehub_models::ReleaseMetadata;
use parking_lot::Mutex;
use serde_json::{Value, json};

pub const UPSTREAM: &str = "http://upstream.example.com";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Write `author-name-version.tar.gz` into `dir` and return its path.
pub fn write_package(dir: &Path, metadata: &ReleaseMetadata) -> PathBuf {
    let prefix = format!("{}-{}", metadata.full_name(), metadata.version);
    let document = serde_json::to_vec(metadata).expect("serialize metadata");

    let mut writer = ArchiveWriter::new().with_prefix(&prefix);
    writer.add_file("metadata.json", 0o644, move |out| {
        out.extend_from_slice(&document);
        Ok(())
    });
    let path = dir.join(format!("{prefix}.tar.gz"));
    std::fs::write(&path, writer.into_bytes().expect("build package")).expect("write package");
    path
}

pub fn metadata(full_name: &str, version: &str) -> ReleaseMetadata {
    ReleaseMetadata::new(full_name, version)
}

/// v3 release document as served by an upstream registry
pub fn release_document(author: &str, name: &str, version: &str) -> Value {
    json!({
        "uri": format!("/v3/releases/{author}-{name}-{version}"),
        "module": {
            "uri": format!("/v3/modules/{author}-{name}"),
            "name": name,
            "owner": { "username": author }
        },
        "version": version,
        "metadata": { "name": format!("{author}-{name}"), "version": version },
        "file_uri": format!("/v3/files/{author}-{name}-{version}.tar.gz")
    })
}

/// v3 module document whose current release is the first of `versions`
pub fn module_document(author: &str, name: &str, versions: &[&str]) -> Value {
    json!({
        "uri": format!("/v3/modules/{author}-{name}"),
        "name": name,
        "owner": { "username": author },
        "current_release": release_document(author, name, versions[0]),
        "releases": versions
            .iter()
            .map(|v| json!({ "uri": format!("/v3/releases/{author}-{name}-{v}"), "version": v }))
            .collect::<Vec<_>>()
    })
}

pub fn page(results: Vec<Value>, next: Option<&str>) -> Value {
    json!({
        "pagination": {
            "limit": 20,
            "offset": 0,
            "next": next,
            "total": results.len()
        },
        "results": results
    })
}

enum FakeResponse {
    Body(Bytes),
    Status(u16),
}

/// In-memory upstream: canned responses per URL, with call counting.
#[derive(Default)]
pub struct FakeHttpClient {
    responses: Mutex<HashMap<String, FakeResponse>>,
    calls: Mutex<Vec<String>>,
}

impl FakeHttpClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond_json(&self, path: &str, body: Value) {
        self.respond_bytes(path, body.to_string().into_bytes());
    }

    pub fn respond_bytes(&self, path: &str, body: impl Into<Bytes>) {
        self.responses
            .lock()
            .insert(format!("{UPSTREAM}{path}"), FakeResponse::Body(body.into()));
    }

    pub fn respond_status(&self, path: &str, status: u16) {
        self.responses
            .lock()
            .insert(format!("{UPSTREAM}{path}"), FakeResponse::Status(status));
    }

    /// Number of requests made for `path`
    pub fn calls(&self, path: &str) -> usize {
        let url = format!("{UPSTREAM}{path}");
        self.calls.lock().iter().filter(|called| **called == url).count()
    }

    fn respond(&self, url: &str) -> Result<Bytes, HttpError> {
        self.calls.lock().push(url.to_string());
        match self.responses.lock().get(url) {
            Some(FakeResponse::Body(body)) => Ok(body.clone()),
            Some(FakeResponse::Status(status)) => Err(HttpError::Status {
                status: *status,
                url: url.to_string(),
            }),
            None => Err(HttpError::Status {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}

#[async_trait]
impl HttpClient for FakeHttpClient {
    async fn get(&self, url: &str) -> Result<Bytes, HttpError> {
        self.respond(url)
    }

    async fn download(&self, url: &str) -> Result<ModuleBuffer, HttpError> {
        let body = self.respond(url)?;
        let size = body.len() as u64;
        Ok(ModuleBuffer::from_reader(std::io::Cursor::new(body), Some(size)))
    }
}
