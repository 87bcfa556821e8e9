//! v3 registry JSON documents.
//!
//! These are both what the registry serves and what the proxy forge reads
//! from an upstream registry, so every field tolerates being absent.

use serde::{Deserialize, Serialize};

use crate::metadata::ReleaseMetadata;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnerDocument {
    #[serde(default)]
    pub uri: String,
    pub username: String,
    #[serde(default)]
    pub gravatar_id: Option<String>,
}

impl OwnerDocument {
    pub fn for_author(author: &str) -> Self {
        Self {
            uri: format!("/v3/users/{author}"),
            username: author.to_string(),
            gravatar_id: None,
        }
    }
}

/// Short module reference embedded in release documents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleShortDocument {
    #[serde(default)]
    pub uri: String,
    pub name: String,
    pub owner: OwnerDocument,
}

/// Short release reference embedded in module documents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseShortDocument {
    #[serde(default)]
    pub uri: String,
    pub version: String,
    #[serde(default)]
    pub supported: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseDocument {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub module: Option<ModuleShortDocument>,
    pub version: String,
    #[serde(default)]
    pub metadata: ReleaseMetadata,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub supported: bool,
    #[serde(default)]
    pub file_uri: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub file_sha256: Option<String>,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub readme: Option<String>,
    #[serde(default)]
    pub changelog: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleDocument {
    #[serde(default)]
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub supported: bool,
    #[serde(default)]
    pub endorsement: Option<String>,
    pub owner: OwnerDocument,
    pub current_release: ReleaseDocument,
    #[serde(default)]
    pub releases: Vec<ReleaseShortDocument>,
    #[serde(default)]
    pub homepage_url: Option<String>,
    #[serde(default)]
    pub issues_url: Option<String>,
}

/// Entry of the legacy `/api/v1/releases.json` listing
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LegacyReleaseDocument {
    pub version: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<(String, Option<String>)>,
}
