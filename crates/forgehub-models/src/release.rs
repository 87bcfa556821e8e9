//! A single published version of a module.

use crate::document::{
    LegacyReleaseDocument, ModuleShortDocument, OwnerDocument, ReleaseDocument,
    ReleaseShortDocument,
};
use crate::error::ModelError;
use crate::metadata::{Dependency, ReleaseMetadata, SourceMetadata, split_full_name};

/// One release of a module.
///
/// The owning module is referenced by full name only; a release never keeps
/// its module alive.
#[derive(Debug, Clone, PartialEq)]
pub struct Release {
    author: String,
    name: String,
    version: String,
    metadata: ReleaseMetadata,
    file_uri: String,
    source: SourceMetadata,
}

impl Release {
    pub fn new(metadata: ReleaseMetadata, source: SourceMetadata) -> Result<Self, ModelError> {
        if metadata.name.is_empty() {
            return Err(ModelError::MissingField("name"));
        }
        if metadata.version.is_empty() {
            return Err(ModelError::MissingField("version"));
        }
        let (author, name) = split_full_name(&metadata.name)?;
        let version = metadata.version.clone();
        let file_uri = format!("/v3/files/{author}-{name}-{version}.tar.gz");

        Ok(Self {
            author,
            name,
            version,
            metadata,
            file_uri,
            source,
        })
    }

    /// Build a release from a v3 release document.
    pub fn from_document(document: ReleaseDocument) -> Result<Self, ModelError> {
        let mut metadata = document.metadata;
        if metadata.name.is_empty() {
            let module = document
                .module
                .as_ref()
                .ok_or(ModelError::MissingField("metadata.name"))?;
            metadata.name = format!("{}-{}", module.owner.username, module.name);
        }
        if metadata.version.is_empty() {
            metadata.version = document.version.clone();
        }

        let source = SourceMetadata {
            file_size: document.file_size,
            file_sha256: document.file_sha256,
            readme: document.readme,
            changelog: document.changelog,
        };
        let mut release = Self::new(metadata, source)?;
        if !document.file_uri.is_empty() {
            release.file_uri = document.file_uri;
        }
        Ok(release)
    }

    /// Build a placeholder release from the short form listed in a module
    /// document. Only name and version are known.
    pub fn from_short_document(
        module_full_name: &str,
        document: &ReleaseShortDocument,
    ) -> Result<Self, ModelError> {
        Self::new(
            ReleaseMetadata::new(module_full_name, document.version.clone()),
            SourceMetadata::default(),
        )
    }

    /// Build a release from an entry of the legacy per-module release listing.
    pub fn from_legacy_document(
        module_full_name: &str,
        document: LegacyReleaseDocument,
    ) -> Result<Self, ModelError> {
        let mut metadata = ReleaseMetadata::new(module_full_name, document.version);
        metadata.dependencies = document
            .dependencies
            .into_iter()
            .map(|(name, version_requirement)| Dependency {
                name,
                version_requirement,
            })
            .collect();

        let mut release = Self::new(metadata, SourceMetadata::default())?;
        if let Some(file) = document.file {
            release.file_uri = file;
        }
        Ok(release)
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn metadata(&self) -> &ReleaseMetadata {
        &self.metadata
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.metadata.dependencies
    }

    pub fn file_uri(&self) -> &str {
        &self.file_uri
    }

    pub fn source(&self) -> &SourceMetadata {
        &self.source
    }

    /// Full name of the owning module (`author-name`)
    pub fn module_full_name(&self) -> String {
        format!("{}-{}", self.author, self.name)
    }

    /// Full name of this release (`author-name-version`)
    pub fn full_name(&self) -> String {
        format!("{}-{}-{}", self.author, self.name, self.version)
    }

    /// Archive file name for this release
    pub fn file_name(&self) -> String {
        format!("{}.tar.gz", self.full_name())
    }

    /// Whether the release matches a `module` filter. The filter may name the
    /// module or this exact release; no filter matches everything.
    pub fn matches(&self, module_filter: Option<&str>) -> bool {
        match module_filter {
            None => true,
            Some(filter) => filter == self.full_name() || filter == self.module_full_name(),
        }
    }

    pub fn to_short_document(&self) -> ReleaseShortDocument {
        ReleaseShortDocument {
            uri: format!("/v3/releases/{}", self.full_name()),
            version: self.version.clone(),
            supported: false,
        }
    }

    pub fn to_document(&self) -> ReleaseDocument {
        ReleaseDocument {
            uri: format!("/v3/releases/{}", self.full_name()),
            module: Some(ModuleShortDocument {
                uri: format!("/v3/modules/{}", self.module_full_name()),
                name: self.name.clone(),
                owner: OwnerDocument::for_author(&self.author),
            }),
            version: self.version.clone(),
            metadata: self.metadata.clone(),
            tags: Vec::new(),
            supported: false,
            file_uri: self.file_uri.clone(),
            file_size: self.source.file_size,
            file_sha256: self.source.file_sha256.clone(),
            downloads: 0,
            readme: self.source.readme.clone(),
            changelog: self.source.changelog.clone(),
            license: self.metadata.license.clone(),
            created_at: None,
            updated_at: None,
            deleted_at: None,
        }
    }
}
