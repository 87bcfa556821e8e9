//! Forge traits and implementations.
//!
//! A forge is a source of modules: a directory of packages, a source
//! checkout, a Nexus-style repository, an upstream registry, or an ordered
//! combination of these.

mod directory;
mod modulefile;
mod multi;
mod nexus;
mod proxy;
mod source;

pub use directory::DirectoryForge;
pub use modulefile::Modulefile;
pub use multi::MultiForge;
pub use nexus::NexusForge;
pub use proxy::{DEFAULT_QUERY_TTL, ProxyForge};
pub use source::{METADATA_CACHE_TTL, SourceForge};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use forgehub_models::{
    Module, ModelError, Release, ReleaseMetadata, SourceMetadata, normalize_full_name,
};
use serde::{Deserialize, Serialize};

use crate::buffer::ModuleBuffer;
use crate::error::{ForgeError, Result};

/// Module search parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleQuery {
    /// Substring matched against module full names
    pub query: Option<String>,
}

impl ModuleQuery {
    pub fn matching(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
        }
    }
}

/// Release search parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseFilter {
    /// Only releases of this module (`author-name`)
    pub module: Option<String>,
}

impl ReleaseFilter {
    pub fn for_module(full_name: &str) -> Self {
        Self {
            module: Some(normalize_full_name(full_name)),
        }
    }
}

/// Trait for forges (sources of modules)
#[async_trait]
pub trait Forge: Send + Sync {
    /// Get the forge name, used in logs
    fn name(&self) -> &str;

    /// Snapshot of every module the forge holds.
    ///
    /// Forges that keep their modules in memory return it and inherit the
    /// query operations below; others override those operations instead.
    async fn index(&self) -> Result<Arc<ModuleIndex>> {
        Err(ForgeError::Unsupported(format!("{} has no module index", self.name())))
    }

    /// Search for modules whose full name contains the query
    async fn search_modules(&self, query: &ModuleQuery) -> Result<Vec<Module>> {
        Ok(self.index().await?.search_modules(query))
    }

    /// Search for releases, optionally restricted to one module
    async fn search_releases(&self, filter: &ReleaseFilter) -> Result<Vec<Release>> {
        Ok(self.index().await?.search_releases(filter))
    }

    /// Get a module with all its known releases
    async fn get_module_metadata(&self, author: &str, name: &str) -> Result<Module> {
        self.index().await?.module(author, name)
    }

    /// Get a single release
    async fn get_release_metadata(&self, author: &str, name: &str, version: &str) -> Result<Release> {
        self.index().await?.release(author, name, version)
    }

    /// Get the package of a release
    async fn get_module_buffer(&self, author: &str, name: &str, version: &str)
    -> Result<ModuleBuffer>;

    /// List every release of a module, including dependency declarations.
    async fn list_releases(&self, author: &str, name: &str) -> Result<Vec<Release>> {
        Ok(self.get_module_metadata(author, name).await?.into_releases())
    }

    /// Warm internal caches
    async fn prime(&self) -> Result<()> {
        Ok(())
    }

    /// Drop internal caches
    async fn clear_cache(&self) {}
}

/// In-memory collection of modules, merged by full name as releases are added
#[derive(Debug, Clone, Default)]
pub struct ModuleIndex {
    modules: Vec<Module>,
}

impl ModuleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// Add a release, creating its module on first sight.
    pub fn add_release(
        &mut self,
        metadata: ReleaseMetadata,
        source: SourceMetadata,
    ) -> std::result::Result<(), ModelError> {
        let release = Release::new(metadata, source)?;
        match self
            .modules
            .iter_mut()
            .find(|m| m.author() == release.author() && m.name() == release.name())
        {
            Some(module) => {
                module.add_release(release);
            }
            None => self.modules.push(Module::new(release)),
        }
        Ok(())
    }

    pub fn search_modules(&self, query: &ModuleQuery) -> Vec<Module> {
        self.modules
            .iter()
            .filter(|m| m.matches(query.query.as_deref()))
            .cloned()
            .collect()
    }

    pub fn search_releases(&self, filter: &ReleaseFilter) -> Vec<Release> {
        self.modules
            .iter()
            .flat_map(|m| m.matching_releases(filter.module.as_deref()))
            .collect()
    }

    pub fn module(&self, author: &str, name: &str) -> Result<Module> {
        self.modules
            .iter()
            .find(|m| m.author() == author && m.name() == name)
            .cloned()
            .ok_or_else(|| ForgeError::not_found(format!("{author}-{name}")))
    }

    pub fn release(&self, author: &str, name: &str, version: &str) -> Result<Release> {
        self.module(author, name)?
            .release(version)
            .cloned()
            .ok_or_else(|| ForgeError::not_found(format!("{author}-{name}-{version}")))
    }
}

/// Check that a configured forge root is an existing, readable directory.
pub(crate) fn validate_directory(path: &Path) -> Result<PathBuf> {
    if !path.is_dir() {
        return Err(ForgeError::InvalidConfig(format!(
            "module directory {} does not exist",
            path.display()
        )));
    }
    std::fs::read_dir(path).map_err(|err| {
        ForgeError::InvalidConfig(format!(
            "module directory {} is not readable: {err}",
            path.display()
        ))
    })?;
    Ok(path.to_path_buf())
}

/// Reject identifiers that would escape a forge root when joined into a path.
pub(crate) fn is_path_safe(component: &str) -> bool {
    !component.is_empty()
        && component != "."
        && component != ".."
        && !component.contains(['/', '\\'])
}

pub(crate) fn release_file_name(author: &str, name: &str, version: &str) -> Result<String> {
    if [author, name, version].iter().all(|c| is_path_safe(c)) {
        Ok(format!("{author}-{name}-{version}.tar.gz"))
    } else {
        Err(ForgeError::not_found(format!("{author}-{name}-{version}")))
    }
}
