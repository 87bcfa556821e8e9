//! Forge serving packaged modules from a flat directory.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use forgehub_models::{ReleaseMetadata, SourceMetadata};
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::{Forge, ModuleIndex, release_file_name, validate_directory};
use crate::archive::ArchiveReader;
use crate::buffer::ModuleBuffer;
use crate::error::{ForgeError, Result};

static PACKAGE_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^-/]+-[^-/]+-.+\.tar\.gz$").expect("valid package regex"));
static METADATA_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^/]+/metadata\.json$").expect("valid metadata regex"));
static README_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^/]+/README(\.[A-Za-z]+)?$").expect("valid readme regex"));
static CHANGELOG_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^/]+/CHANGELOG(\.[A-Za-z]+)?$").expect("valid changelog regex")
});

/// Serves `author-name-version.tar.gz` packages found in one directory.
///
/// Package metadata is read once at construction; packages that cannot be
/// read are skipped with a warning.
pub struct DirectoryForge {
    module_dir: PathBuf,
    index: Arc<ModuleIndex>,
}

impl DirectoryForge {
    pub async fn new(module_dir: impl Into<PathBuf>) -> Result<Self> {
        let module_dir = validate_directory(&module_dir.into())?;
        let dir = module_dir.clone();
        let index = tokio::task::spawn_blocking(move || load_packages(&dir)).await??;

        info!(
            path = %module_dir.display(),
            modules = index.len(),
            "Loaded module directory"
        );
        Ok(Self {
            module_dir,
            index: Arc::new(index),
        })
    }

    pub fn module_dir(&self) -> &Path {
        &self.module_dir
    }
}

fn load_packages(dir: &Path) -> Result<ModuleIndex> {
    let mut index = ModuleIndex::new();
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| PACKAGE_FILE.is_match(name))
        })
        .collect();
    paths.sort();

    for path in paths {
        let loaded = read_package(&path).and_then(|(metadata, source)| {
            index.add_release(metadata, source).map_err(ForgeError::from)
        });
        if let Err(err) = loaded {
            warn!(path = %path.display(), error = %err, "Skipping unreadable module package");
        }
    }
    Ok(index)
}

/// Read metadata, README and CHANGELOG from a package in one pass.
fn read_package(path: &Path) -> Result<(ReleaseMetadata, SourceMetadata)> {
    let data = std::fs::read(path)?;
    let mut entries = ArchiveReader::new(data.as_slice())
        .read_entries(&[&*METADATA_ENTRY, &*README_ENTRY, &*CHANGELOG_ENTRY])?
        .into_iter();

    let metadata = entries
        .next()
        .flatten()
        .ok_or_else(|| ForgeError::Malformed(format!("{} has no metadata.json", path.display())))?;
    let metadata: ReleaseMetadata = serde_json::from_str(&metadata)?;

    let source = SourceMetadata {
        file_size: Some(data.len() as u64),
        file_sha256: Some(hex::encode(Sha256::digest(&data))),
        readme: entries.next().flatten(),
        changelog: entries.next().flatten(),
    };
    Ok((metadata, source))
}

#[async_trait]
impl Forge for DirectoryForge {
    fn name(&self) -> &str {
        "directory"
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
        let path = self.module_dir.join(release_file_name(author, name, version)?);
        if !path.is_file() {
            return Err(ForgeError::not_found(format!("{author}-{name}-{version}")));
        }
        Ok(ModuleBuffer::open(&path).await?)
    }
}
