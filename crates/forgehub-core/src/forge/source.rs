//! Forge serving a single module straight from its source directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use forgehub_models::{ReleaseMetadata, SourceMetadata};
use tracing::debug;

use super::{Forge, ModuleIndex, Modulefile, validate_directory};
use crate::archive::ArchiveWriter;
use crate::buffer::ModuleBuffer;
use crate::cache::{ContentCache, InMemoryCache};
use crate::error::{ForgeError, Result};

/// How long parsed source metadata is reused before the files are read again
pub const METADATA_CACHE_TTL: Duration = Duration::from_millis(500);

const METADATA_KEY: &str = "metadata";

/// Serves one module whose source tree lives on disk.
///
/// Metadata comes from `metadata.json`, or from a legacy `Modulefile` when
/// there is no `metadata.json`. Packages are built on request, with the
/// metadata written out as `metadata.json`.
pub struct SourceForge {
    module_dir: PathBuf,
    metadata_cache: InMemoryCache<ReleaseMetadata>,
}

impl SourceForge {
    pub fn new(module_dir: impl Into<PathBuf>) -> Result<Self> {
        let module_dir = validate_directory(&module_dir.into())?;
        if !module_dir.join("metadata.json").is_file() && !module_dir.join("Modulefile").is_file() {
            return Err(ForgeError::InvalidConfig(format!(
                "module source {} has neither metadata.json nor Modulefile",
                module_dir.display()
            )));
        }
        Ok(Self {
            module_dir,
            metadata_cache: InMemoryCache::new(METADATA_CACHE_TTL),
        })
    }

    pub fn module_dir(&self) -> &Path {
        &self.module_dir
    }

    async fn load_metadata(&self) -> Result<ReleaseMetadata> {
        let dir = self.module_dir.clone();
        self.metadata_cache
            .get_or_compute(METADATA_KEY, Box::pin(read_metadata(dir)))
            .await
    }
}

async fn read_metadata(dir: PathBuf) -> Result<ReleaseMetadata> {
    let metadata_path = dir.join("metadata.json");
    if metadata_path.is_file() {
        debug!(path = %metadata_path.display(), "Reading module metadata");
        let content = tokio::fs::read(&metadata_path).await?;
        return Ok(serde_json::from_slice(&content)?);
    }

    let modulefile_path = dir.join("Modulefile");
    if modulefile_path.is_file() {
        debug!(path = %modulefile_path.display(), "Reading legacy Modulefile");
        return Ok(Modulefile::read(&modulefile_path).await?.into_metadata());
    }

    Err(ForgeError::Malformed(format!(
        "{} has neither metadata.json nor Modulefile",
        dir.display()
    )))
}

#[async_trait]
impl Forge for SourceForge {
    fn name(&self) -> &str {
        "source"
    }

    async fn index(&self) -> Result<Arc<ModuleIndex>> {
        let mut index = ModuleIndex::new();
        index.add_release(self.load_metadata().await?, SourceMetadata::default())?;
        Ok(Arc::new(index))
    }

    async fn get_module_buffer(
        &self,
        author: &str,
        name: &str,
        version: &str,
    ) -> Result<ModuleBuffer> {
        let metadata = self.load_metadata().await?;
        if metadata.full_name() != format!("{author}-{name}") || metadata.version != version {
            return Err(ForgeError::not_found(format!("{author}-{name}-{version}")));
        }

        let document = serde_json::to_vec_pretty(&metadata)?;
        let mut writer = ArchiveWriter::new()
            .with_prefix(format!("{author}-{name}-{version}"))
            .with_directory(&self.module_dir);
        writer.add_file("metadata.json", 0o644, move |out| {
            out.extend_from_slice(&document);
            Ok(())
        });

        let bytes = tokio::task::spawn_blocking(move || writer.into_bytes()).await??;
        Ok(ModuleBuffer::from_bytes(bytes))
    }

    async fn prime(&self) -> Result<()> {
        self.load_metadata().await.map(|_| ())
    }

    async fn clear_cache(&self) {
        self.metadata_cache.clear().await;
    }
}
