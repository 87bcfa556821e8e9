//! Forge reading a Nexus repository storage directory.
//!
//! Layout: `<root>/<author>-<name>/<version>/<author>-<name>-*.tar.gz`, with
//! the release metadata uploaded next to the package as
//! `<author>-<name>-*.json`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::SystemTime;

use async_trait::async_trait;
use forgehub_models::{ReleaseMetadata, SourceMetadata};
use regex::Regex;
use tracing::{info, warn};
use walkdir::WalkDir;

use super::{Forge, ModuleIndex, is_path_safe, validate_directory};
use crate::buffer::ModuleBuffer;
use crate::error::{ForgeError, Result};

static METADATA_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^-/]+-[^-/]+-.+\.json$").expect("valid metadata file regex"));

pub struct NexusForge {
    root: PathBuf,
    index: Arc<ModuleIndex>,
}

impl NexusForge {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = validate_directory(&root.into())?;
        let dir = root.clone();
        let index = tokio::task::spawn_blocking(move || load_metadata_files(&dir)).await?;

        info!(path = %root.display(), modules = index.len(), "Loaded Nexus storage");
        Ok(Self {
            root,
            index: Arc::new(index),
        })
    }

    /// Newest package in the version directory of a release.
    async fn find_package(&self, author: &str, name: &str, version: &str) -> Result<Option<PathBuf>> {
        let module_dir = format!("{author}-{name}");
        let version_dir = self.root.join(&module_dir).join(version);
        if !version_dir.is_dir() {
            return Ok(None);
        }

        let prefix = format!("{module_dir}-");
        let mut newest: Option<(SystemTime, PathBuf)> = None;
        let mut entries = tokio::fs::read_dir(&version_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if !file_name.starts_with(&prefix) || !file_name.ends_with(".tar.gz") {
                continue;
            }
            let modified = entry.metadata().await?.modified()?;
            if newest.as_ref().is_none_or(|(time, _)| modified >= *time) {
                newest = Some((modified, entry.path()));
            }
        }
        Ok(newest.map(|(_, path)| path))
    }
}

fn load_metadata_files(root: &Path) -> ModuleIndex {
    let mut index = ModuleIndex::new();
    let files = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| METADATA_FILE.is_match(name))
        });

    for entry in files {
        let loaded = std::fs::read(entry.path())
            .map_err(ForgeError::from)
            .and_then(|data| Ok(serde_json::from_slice::<ReleaseMetadata>(&data)?))
            .and_then(|metadata| {
                index
                    .add_release(metadata, SourceMetadata::default())
                    .map_err(ForgeError::from)
            });
        if let Err(err) = loaded {
            warn!(path = %entry.path().display(), error = %err, "Skipping unreadable metadata file");
        }
    }
    index
}

#[async_trait]
impl Forge for NexusForge {
    fn name(&self) -> &str {
        "nexus"
    }

    async fn index(&self) -> Result<Arc<ModuleIndex>> {
        Ok(Arc::clone(&self.index))
    }

    async fn get_module_buffer(
        &self,
        author: &str,
        name: &str,
        version: &str,
    ) -> Result<ModuleBuffer> {
        if ![author, name, version].iter().all(|c| is_path_safe(c)) {
            return Err(ForgeError::not_found(format!("{author}-{name}-{version}")));
        }
        let path = self
            .find_package(author, name, version)
            .await?
            .ok_or_else(|| ForgeError::not_found(format!("{author}-{name}-{version}")))?;
        Ok(ModuleBuffer::open(&path).await?)
    }
}
