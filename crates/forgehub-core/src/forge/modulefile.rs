//! Legacy `Modulefile` parsing.

use std::path::Path;
use std::sync::LazyLock;

use forgehub_models::{Dependency, ReleaseMetadata, normalize_full_name};
use regex::Regex;
use tracing::debug;

use crate::error::{ForgeError, Result};

// A directive name followed by its arguments, e.g. `dependency 'bob/bar', '>= 1.0'`
static DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([a-z_]+)\s+(.+?)\s*$").expect("valid directive regex"));
static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"'([^']*)'|"([^"]*)""#).expect("valid argument regex"));

/// Module description in the pre-`metadata.json` format
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Modulefile {
    pub name: String,
    pub version: String,
    pub author: Option<String>,
    pub license: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub project_page: Option<String>,
    pub source: Option<String>,
    pub dependencies: Vec<Dependency>,
}

impl Modulefile {
    pub async fn read(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut modulefile = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some(captures) = DIRECTIVE.captures(line) else {
                debug!(line, "Ignoring unrecognised Modulefile line");
                continue;
            };
            let directive = &captures[1];
            let mut args = QUOTED.captures_iter(&captures[2]).map(|arg| {
                arg.get(1)
                    .or_else(|| arg.get(2))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default()
            });
            let Some(value) = args.next() else {
                debug!(directive, "Modulefile directive without quoted argument");
                continue;
            };

            match directive {
                "name" => modulefile.name = normalize_full_name(&value),
                "version" => modulefile.version = value,
                "author" => modulefile.author = Some(value),
                "license" => modulefile.license = Some(value),
                "summary" => modulefile.summary = Some(value),
                "description" => modulefile.description = Some(value),
                "project_page" => modulefile.project_page = Some(value),
                "source" => modulefile.source = Some(value),
                "dependency" => modulefile.dependencies.push(Dependency {
                    name: normalize_full_name(&value),
                    version_requirement: args.next(),
                }),
                other => debug!(directive = other, "Ignoring unknown Modulefile directive"),
            }
        }

        if modulefile.name.is_empty() {
            return Err(ForgeError::Malformed("Modulefile has no name".into()));
        }
        if modulefile.version.is_empty() {
            return Err(ForgeError::Malformed("Modulefile has no version".into()));
        }
        Ok(modulefile)
    }

    pub fn into_metadata(self) -> ReleaseMetadata {
        let mut metadata = ReleaseMetadata::new(self.name, self.version);
        metadata.author = self.author;
        metadata.license = self.license;
        metadata.summary = self.summary;
        metadata.description = self.description;
        metadata.project_page = self.project_page;
        metadata.source = self.source;
        metadata.dependencies = self.dependencies;
        metadata
    }
}
