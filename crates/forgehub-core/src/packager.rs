//! Dependency packaging: resolve a module's direct dependencies and bundle
//! every resolved package into one archive.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use forgehub_models::{Release, compare_versions, split_full_name};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::archive::ArchiveWriter;
use crate::buffer::ModuleBuffer;
use crate::error::{ForgeError, Result};
use crate::forge::Forge;

/// A module release together with the releases chosen for its dependencies
#[derive(Debug, Clone)]
pub struct PackManifest {
    root: String,
    releases: BTreeMap<String, Release>,
}

/// Manifest line for one resolved module
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackEntry {
    pub version: String,
    pub file: String,
}

impl PackManifest {
    /// Full name of the module being packed
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Resolved releases keyed by module full name, root included
    pub fn releases(&self) -> &BTreeMap<String, Release> {
        &self.releases
    }

    pub fn get(&self, full_name: &str) -> Option<&Release> {
        self.releases.get(full_name)
    }

    pub fn to_document(&self) -> BTreeMap<String, PackEntry> {
        self.releases
            .iter()
            .map(|(full_name, release)| {
                (
                    full_name.clone(),
                    PackEntry {
                        version: release.version().to_string(),
                        file: release.file_uri().to_string(),
                    },
                )
            })
            .collect()
    }
}

/// Pick the release whose version equals `requirement`, else the highest one.
pub fn select_release<'a>(releases: &'a [Release], requirement: Option<&str>) -> Option<&'a Release> {
    requirement
        .map(str::trim)
        .and_then(|wanted| releases.iter().find(|r| r.version() == wanted))
        .or_else(|| {
            releases
                .iter()
                .max_by(|a, b| compare_versions(a.version(), b.version()))
        })
}

pub struct DependencyPackager {
    forge: Arc<dyn Forge>,
    scratch_root: PathBuf,
}

impl DependencyPackager {
    pub fn new(forge: Arc<dyn Forge>) -> Self {
        Self {
            forge,
            scratch_root: std::env::temp_dir(),
        }
    }

    /// Create scratch directories under `root` instead of the system temp dir.
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = root.into();
        self
    }

    /// Resolve a release and its direct dependencies.
    ///
    /// Without an explicit version the module's highest release is packed.
    pub async fn pack(&self, author: &str, name: &str, version: Option<&str>) -> Result<PackManifest> {
        let root_name = format!("{author}-{name}");
        let candidates = self.forge.list_releases(author, name).await?;
        let root = match version {
            Some(version) => candidates.iter().find(|r| r.version() == version),
            None => select_release(&candidates, None),
        }
        .cloned()
        .ok_or_else(|| {
            ForgeError::not_found(format!("{root_name}-{}", version.unwrap_or("latest")))
        })?;

        let mut releases = BTreeMap::new();
        for dependency in root.dependencies() {
            let full_name = dependency.full_name();
            if full_name == root_name || releases.contains_key(&full_name) {
                continue;
            }
            let (dep_author, dep_name) = split_full_name(&full_name)?;
            let available = self.forge.list_releases(&dep_author, &dep_name).await?;
            let chosen = select_release(&available, dependency.version_requirement.as_deref())
                .cloned()
                .ok_or_else(|| ForgeError::not_found(full_name.clone()))?;
            debug!(
                dependency = %full_name,
                requirement = ?dependency.version_requirement,
                version = chosen.version(),
                "Resolved dependency"
            );
            releases.insert(full_name, chosen);
        }
        releases.insert(root_name.clone(), root);

        Ok(PackManifest {
            root: root_name,
            releases,
        })
    }

    /// Fetch every package of a manifest and bundle them into one archive.
    ///
    /// The scratch directory is removed whether or not bundling succeeds.
    pub async fn download(
        &self,
        author: &str,
        name: &str,
        version: Option<&str>,
    ) -> Result<ModuleBuffer> {
        let manifest = self.pack(author, name, version).await?;
        let scratch = tempfile::Builder::new()
            .prefix("forgehub-pack-")
            .tempdir_in(&self.scratch_root)?;

        for release in manifest.releases().values() {
            let buffer = self
                .forge
                .get_module_buffer(release.author(), release.name(), release.version())
                .await?;
            let mut reader = buffer.into_reader();
            let mut file = tokio::fs::File::create(scratch.path().join(release.file_name())).await?;
            tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
        }

        let dir = scratch.path().to_path_buf();
        let bytes =
            tokio::task::spawn_blocking(move || ArchiveWriter::new().with_directory(dir).into_bytes())
                .await??;
        scratch.close()?;

        info!(
            module = manifest.root(),
            packages = manifest.releases().len(),
            "Bundled module with dependencies"
        );
        Ok(ModuleBuffer::from_bytes(bytes))
    }
}
