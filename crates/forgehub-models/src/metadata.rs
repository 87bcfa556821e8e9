//! Release metadata documents (`metadata.json`).
//!
//! The document is treated as mostly opaque: the fields the registry needs
//! are typed, everything else is carried through untouched in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ModelError;

/// Parsed `metadata.json` of a single release
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseMetadata {
    /// Module full name (`author-name`, sometimes written `author/name`)
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues_url: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    /// Fields not interpreted by the registry
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReleaseMetadata {
    pub fn new(full_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: full_name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    /// Module full name in canonical `author-name` form
    pub fn full_name(&self) -> String {
        normalize_full_name(&self.name)
    }

    pub fn with_dependency(mut self, name: &str, requirement: &str) -> Self {
        self.dependencies.push(Dependency {
            name: name.to_string(),
            version_requirement: Some(requirement.to_string()),
        });
        self
    }
}

/// A declared dependency on another module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_requirement: Option<String>,
}

impl Dependency {
    pub fn full_name(&self) -> String {
        normalize_full_name(&self.name)
    }
}

/// Attributes of a release that come from where it is stored rather than
/// from its metadata document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMetadata {
    pub file_size: Option<u64>,
    pub file_sha256: Option<String>,
    pub readme: Option<String>,
    pub changelog: Option<String>,
}

/// Convert `author/name` into `author-name`.
pub fn normalize_full_name(name: &str) -> String {
    name.replacen('/', "-", 1)
}

/// Split a module full name into `(author, name)`.
pub fn split_full_name(full_name: &str) -> Result<(String, String), ModelError> {
    let normalized = normalize_full_name(full_name);
    match normalized.split_once('-') {
        Some((author, name)) if !author.is_empty() && !name.is_empty() => {
            Ok((author.to_string(), name.to_string()))
        }
        _ => Err(ModelError::InvalidName(full_name.to_string())),
    }
}
