//! Forge routing requests over an ordered list of sub-forges.

use std::sync::Arc;

use async_trait::async_trait;
use forgehub_models::{Module, Page, Release, merge_modules, merge_releases};
use futures::future::join_all;
use tracing::{debug, warn};

use super::{Forge, ModuleQuery, ReleaseFilter};
use crate::buffer::ModuleBuffer;
use crate::error::{ForgeError, Result};

/// Delegates to several forges.
///
/// Queries go to every sub-forge and the results are merged, preferring
/// earlier forges when the same version appears twice. Single-release
/// lookups and downloads try the sub-forges in order and return the first
/// hit. Sub-forges that do not have the module, or do not support the
/// operation, are skipped; any other failure is returned as is.
#[derive(Default)]
pub struct MultiForge {
    forges: Vec<Arc<dyn Forge>>,
}

impl MultiForge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add another forge to delegate to, after the existing ones.
    pub fn add_forge(&mut self, forge: Arc<dyn Forge>) {
        self.forges.push(forge);
    }

    pub fn forges(&self) -> &[Arc<dyn Forge>] {
        &self.forges
    }

    /// Search results wrapped in a single-page envelope
    pub async fn module_page(&self, query: &ModuleQuery) -> Result<Page<Module>> {
        Ok(Page::single(self.search_modules(query).await?))
    }

    pub async fn release_page(&self, filter: &ReleaseFilter) -> Result<Page<Release>> {
        Ok(Page::single(self.search_releases(filter).await?))
    }
}

/// Turn a skippable sub-forge failure into `None`.
fn skip_missing<T>(forge: &dyn Forge, result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_skippable() => {
            debug!(forge = forge.name(), error = %err, "Skipping forge");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

#[async_trait]
impl Forge for MultiForge {
    fn name(&self) -> &str {
        "multi"
    }

    async fn search_modules(&self, query: &ModuleQuery) -> Result<Vec<Module>> {
        let mut results = Vec::new();
        for forge in &self.forges {
            if let Some(found) = skip_missing(forge.as_ref(), forge.search_modules(query).await)? {
                results.extend(found);
            }
        }
        Ok(merge_modules(results))
    }

    async fn search_releases(&self, filter: &ReleaseFilter) -> Result<Vec<Release>> {
        let mut results = Vec::new();
        for forge in &self.forges {
            if let Some(found) = skip_missing(forge.as_ref(), forge.search_releases(filter).await)? {
                results.extend(found);
            }
        }
        Ok(merge_releases(results))
    }

    async fn get_module_metadata(&self, author: &str, name: &str) -> Result<Module> {
        let mut combined: Option<Module> = None;
        for forge in &self.forges {
            let found = forge.get_module_metadata(author, name).await;
            if let Some(module) = skip_missing(forge.as_ref(), found)? {
                match combined.as_mut() {
                    Some(existing) => existing.merge(module),
                    None => combined = Some(module),
                }
            }
        }
        combined.ok_or_else(|| ForgeError::not_found(format!("{author}-{name}")))
    }

    async fn get_release_metadata(&self, author: &str, name: &str, version: &str) -> Result<Release> {
        for forge in &self.forges {
            let found = forge.get_release_metadata(author, name, version).await;
            if let Some(release) = skip_missing(forge.as_ref(), found)? {
                return Ok(release);
            }
        }
        Err(ForgeError::not_found(format!("{author}-{name}-{version}")))
    }

    async fn get_module_buffer(
        &self,
        author: &str,
        name: &str,
        version: &str,
    ) -> Result<ModuleBuffer> {
        for forge in &self.forges {
            let found = forge.get_module_buffer(author, name, version).await;
            if let Some(buffer) = skip_missing(forge.as_ref(), found)? {
                debug!(forge = forge.name(), "Serving {author}-{name}-{version}");
                return Ok(buffer);
            }
        }
        Err(ForgeError::not_found(format!("{author}-{name}-{version}")))
    }

    /// Union of every sub-forge's release list; earlier forges win per version.
    async fn list_releases(&self, author: &str, name: &str) -> Result<Vec<Release>> {
        let mut releases: Vec<Release> = Vec::new();
        let mut found_any = false;
        for forge in &self.forges {
            let found = forge.list_releases(author, name).await;
            if let Some(listed) = skip_missing(forge.as_ref(), found)? {
                found_any = true;
                for release in listed {
                    if !releases.iter().any(|r| r.version() == release.version()) {
                        releases.push(release);
                    }
                }
            }
        }
        if !found_any {
            return Err(ForgeError::not_found(format!("{author}-{name}")));
        }
        Ok(releases)
    }

    async fn prime(&self) -> Result<()> {
        join_all(self.forges.iter().map(|forge| async move {
            if let Err(err) = forge.prime().await {
                warn!(forge = forge.name(), error = %err, "Failed to prime forge");
            }
        }))
        .await;
        Ok(())
    }

    async fn clear_cache(&self) {
        join_all(self.forges.iter().map(|forge| forge.clear_cache())).await;
    }
}
