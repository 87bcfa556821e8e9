//! Registry configuration file support
//!
//! A registry is described by an ordered list of forges, e.g.
//!
//! ```toml
//! [[forge]]
//! type = "directory"
//! path = "/var/modules"
//!
//! [[forge]]
//! type = "proxy"
//! url = "https://forgeapi.example.com"
//! cache_downloads = true
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::{BufferingCache, InMemoryCache};
use crate::error::{ForgeError, Result};
use crate::forge::{
    DEFAULT_QUERY_TTL, DirectoryForge, Forge, MultiForge, NexusForge, ProxyForge, SourceForge,
};

/// Configuration of a single forge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ForgeConfig {
    /// Directory of packaged modules
    Directory { path: PathBuf },
    /// Source tree of one module
    Source { path: PathBuf },
    /// Nexus repository storage directory
    Nexus { path: PathBuf },
    /// Remote registry
    Proxy {
        url: String,
        /// Lifetime of cached query responses, in seconds
        #[serde(default)]
        query_ttl_secs: Option<u64>,
        /// Keep downloaded packages in memory for `query_ttl_secs`
        #[serde(default)]
        cache_downloads: bool,
    },
}

impl ForgeConfig {
    /// Construct the forge, validating its options.
    pub async fn build(&self) -> Result<Arc<dyn Forge>> {
        let forge: Arc<dyn Forge> = match self {
            Self::Directory { path } => Arc::new(DirectoryForge::new(path).await?),
            Self::Source { path } => Arc::new(SourceForge::new(path)?),
            Self::Nexus { path } => Arc::new(NexusForge::new(path).await?),
            Self::Proxy {
                url,
                query_ttl_secs,
                cache_downloads,
            } => {
                let ttl = query_ttl_secs
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_QUERY_TTL);
                let mut proxy =
                    ProxyForge::new(url)?.with_query_cache(Arc::new(InMemoryCache::new(ttl)));
                if *cache_downloads {
                    proxy = proxy.with_download_cache(Arc::new(BufferingCache::new(ttl)));
                }
                Arc::new(proxy)
            }
        };
        Ok(forge)
    }
}

/// Registry configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Forges in precedence order
    #[serde(default, rename = "forge")]
    pub forges: Vec<ForgeConfig>,
}

impl RegistryConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|err| ForgeError::InvalidConfig(err.to_string()))
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            ForgeError::InvalidConfig(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Build every configured forge, in order, into one root forge.
    pub async fn build(&self) -> Result<MultiForge> {
        let mut multi = MultiForge::new();
        for config in &self.forges {
            multi.add_forge(config.build().await?);
        }
        info!(forges = multi.forges().len(), "Registry configured");
        Ok(multi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_registry_config() {
        let config = RegistryConfig::from_toml_str(
            r#"
            [[forge]]
            type = "directory"
            path = "/var/modules"

            [[forge]]
            type = "proxy"
            url = "https://forgeapi.example.com"
            query_ttl_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(
            config.forges,
            vec![
                ForgeConfig::Directory {
                    path: PathBuf::from("/var/modules")
                },
                ForgeConfig::Proxy {
                    url: "https://forgeapi.example.com".into(),
                    query_ttl_secs: Some(30),
                    cache_downloads: false,
                },
            ]
        );
    }

    #[test]
    fn test_unknown_forge_type_is_rejected() {
        let result = RegistryConfig::from_toml_str("[[forge]]\ntype = \"ftp\"\npath = \"/x\"\n");
        assert!(matches!(result, Err(ForgeError::InvalidConfig(_))));
    }

    #[test]
    fn test_missing_required_option_is_rejected() {
        let result = RegistryConfig::from_toml_str("[[forge]]\ntype = \"proxy\"\n");
        assert!(matches!(result, Err(ForgeError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_build_fails_fast_on_bad_path() {
        let config = RegistryConfig {
            forges: vec![ForgeConfig::Directory {
                path: PathBuf::from("/nonexistent/forgehub"),
            }],
        };
        assert!(matches!(
            config.build().await,
            Err(ForgeError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_config_builds_empty_registry() {
        let multi = RegistryConfig::default().build().await.unwrap();
        assert!(multi.forges().is_empty());
    }
}
