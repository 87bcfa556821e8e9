//! Modules and their release sets.

use std::cmp::Ordering;

use crate::document::{ModuleDocument, OwnerDocument};
use crate::error::ModelError;
use crate::metadata::{ReleaseMetadata, SourceMetadata};
use crate::release::Release;
use crate::version::{compare_versions, sort_by_version_desc};

/// A module identified by `author-name`, owning one or more releases.
///
/// Invariants: release versions are unique, there is always at least one
/// release, and the current release is the one with the greatest version.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    author: String,
    name: String,
    releases: Vec<Release>,
    current: usize,
    homepage_url: Option<String>,
    issues_url: Option<String>,
}

impl Module {
    pub fn new(release: Release) -> Self {
        let metadata = release.metadata();
        let homepage_url = metadata.project_page.clone();
        let issues_url = metadata.issues_url.clone();

        Self {
            author: release.author().to_string(),
            name: release.name().to_string(),
            releases: vec![release],
            current: 0,
            homepage_url,
            issues_url,
        }
    }

    pub fn from_metadata(
        metadata: ReleaseMetadata,
        source: SourceMetadata,
    ) -> Result<Self, ModelError> {
        Ok(Self::new(Release::new(metadata, source)?))
    }

    /// Build a module from a v3 module document. Releases other than the
    /// current one are only known by version.
    pub fn from_document(document: ModuleDocument) -> Result<Self, ModelError> {
        let full_name = format!("{}-{}", document.owner.username, document.name);
        let mut module = Self::new(Release::from_document(document.current_release)?);
        if document.homepage_url.is_some() {
            module.homepage_url = document.homepage_url;
        }
        if document.issues_url.is_some() {
            module.issues_url = document.issues_url;
        }
        for short in &document.releases {
            module.add_release(Release::from_short_document(&full_name, short)?);
        }
        Ok(module)
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `author-name`
    pub fn full_name(&self) -> String {
        format!("{}-{}", self.author, self.name)
    }

    /// Releases in the order they were added
    pub fn releases(&self) -> &[Release] {
        &self.releases
    }

    /// Releases with the latest version first
    pub fn releases_by_version_desc(&self) -> Vec<&Release> {
        let mut releases: Vec<&Release> = self.releases.iter().collect();
        sort_by_version_desc(&mut releases, |r| r.version());
        releases
    }

    pub fn current_release(&self) -> &Release {
        &self.releases[self.current]
    }

    pub fn release(&self, version: &str) -> Option<&Release> {
        self.releases.iter().find(|r| r.version() == version)
    }

    pub fn has_version(&self, version: &str) -> bool {
        self.release(version).is_some()
    }

    /// Add a release. A release whose version is already present is ignored;
    /// returns whether the release was added.
    pub fn add_release(&mut self, release: Release) -> bool {
        if self.has_version(release.version()) {
            return false;
        }
        self.releases.push(release);
        self.recompute_current();
        true
    }

    /// Fold another module with the same full name into this one.
    ///
    /// Versions already present are kept; only unseen versions are taken
    /// from `other`. Presentation fields keep the first non-empty value.
    pub fn merge(&mut self, other: Module) {
        debug_assert_eq!(self.full_name(), other.full_name());
        if self.homepage_url.is_none() {
            self.homepage_url = other.homepage_url;
        }
        if self.issues_url.is_none() {
            self.issues_url = other.issues_url;
        }
        for release in other.releases {
            if !self.has_version(release.version()) {
                self.releases.push(release);
            }
        }
        self.recompute_current();
    }

    /// Free-text match against the full name; no query matches everything.
    pub fn matches(&self, query: Option<&str>) -> bool {
        match query {
            None => true,
            Some(query) => self.full_name().contains(query),
        }
    }

    pub fn matching_releases(&self, module_filter: Option<&str>) -> Vec<Release> {
        self.releases
            .iter()
            .filter(|r| r.matches(module_filter))
            .cloned()
            .collect()
    }

    pub fn into_releases(self) -> Vec<Release> {
        self.releases
    }

    pub fn to_document(&self) -> ModuleDocument {
        ModuleDocument {
            uri: format!("/v3/modules/{}", self.full_name()),
            name: self.name.clone(),
            downloads: 0,
            created_at: None,
            updated_at: None,
            supported: false,
            endorsement: None,
            owner: OwnerDocument::for_author(&self.author),
            current_release: self.current_release().to_document(),
            releases: self
                .releases_by_version_desc()
                .into_iter()
                .map(Release::to_short_document)
                .collect(),
            homepage_url: self.homepage_url.clone(),
            issues_url: self.issues_url.clone(),
        }
    }

    fn recompute_current(&mut self) {
        let mut current = 0;
        for (index, release) in self.releases.iter().enumerate() {
            let best = self.releases[current].version();
            if compare_versions(release.version(), best) == Ordering::Greater {
                current = index;
            }
        }
        self.current = current;
    }
}
