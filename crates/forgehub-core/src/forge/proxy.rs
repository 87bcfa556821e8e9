//! Forge that proxies a remote registry.
//!
//! Queries go through a short-lived cache keyed by request path; package
//! downloads go through a separate cache that streams by default.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use forgehub_models::{
    LegacyReleaseDocument, Module, ModuleDocument, Page, Release, ReleaseDocument,
    normalize_full_name,
};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{Forge, ModuleQuery, ReleaseFilter};
use crate::buffer::ModuleBuffer;
use crate::cache::{ContentCache, InMemoryCache, NoOpCache};
use crate::error::{ForgeError, Result};
use crate::http::{HttpClient, ReqwestHttpClient, join_url, normalize_base_url};

/// Default lifetime of cached upstream query responses
pub const DEFAULT_QUERY_TTL: Duration = Duration::from_secs(60);

pub struct ProxyForge {
    url: String,
    http_client: Arc<dyn HttpClient>,
    query_cache: Arc<dyn ContentCache<Bytes>>,
    download_cache: Arc<dyn ContentCache<ModuleBuffer>>,
}

impl ProxyForge {
    /// Create a proxy for the registry at `url` with default caches
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self {
            url: normalize_base_url(url)?,
            http_client: Arc::new(ReqwestHttpClient::new()),
            query_cache: Arc::new(InMemoryCache::new(DEFAULT_QUERY_TTL)),
            download_cache: Arc::new(NoOpCache),
        })
    }

    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = http_client;
        self
    }

    pub fn with_query_cache(mut self, cache: Arc<dyn ContentCache<Bytes>>) -> Self {
        self.query_cache = cache;
        self
    }

    pub fn with_download_cache(mut self, cache: Arc<dyn ContentCache<ModuleBuffer>>) -> Self {
        self.download_cache = cache;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn get(&self, path: &str) -> Result<Bytes> {
        let url = join_url(&self.url, path);
        let client = Arc::clone(&self.http_client);
        self.query_cache
            .get_or_compute(
                path,
                Box::pin(async move {
                    debug!(url = %url, "Querying upstream forge");
                    let body = client.get(&url).await?;
                    Ok::<_, ForgeError>(body)
                }),
            )
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.get(path).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Follow `next` links until the last page and concatenate the results.
    ///
    /// A link back to any page already fetched ends the walk.
    async fn get_all_pages<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut results = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(path.to_string());

        while let Some(path) = next.take() {
            let page: Page<T> = self.get_json(&path).await?;
            results.extend(page.results);
            visited.insert(path);
            next = page
                .pagination
                .next
                .filter(|link| !link.is_empty())
                .map(|link| link.strip_prefix(&self.url).unwrap_or(&link).to_string());
            if let Some(link) = next.as_ref().filter(|link| visited.contains(*link)) {
                warn!(link = %link, "Upstream pagination revisits a page, stopping");
                next = None;
            }
        }
        Ok(results)
    }

    async fn download(&self, key: &str, file_uri: &str) -> Result<ModuleBuffer> {
        let url = join_url(&self.url, file_uri);
        let client = Arc::clone(&self.http_client);
        self.download_cache
            .get_or_compute(
                key,
                Box::pin(async move {
                    debug!(url = %url, "Downloading module package");
                    let buffer = client.download(&url).await?;
                    Ok::<_, ForgeError>(buffer)
                }),
            )
            .await
    }

    /// Releases of a module from the v1 listing, or `None` if upstream lacks it.
    async fn legacy_releases(&self, author: &str, name: &str) -> Result<Option<Vec<Release>>> {
        let path = format!(
            "/api/v1/releases.json?module={}",
            urlencoding::encode(&format!("{author}/{name}"))
        );
        let listing: HashMap<String, Vec<LegacyReleaseDocument>> = match self.get_json(&path).await {
            Ok(listing) => listing,
            Err(ForgeError::NotFound(_)) => return Ok(None),
            Err(err) => return Err(err),
        };

        let full_name = format!("{author}-{name}");
        let documents = listing
            .into_iter()
            .filter(|(key, _)| normalize_full_name(key) == full_name)
            .flat_map(|(_, documents)| documents);
        let releases = documents
            .map(|document| Release::from_legacy_document(&full_name, document))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Some(releases))
    }
}

fn parse_all<D, T, F>(documents: Vec<D>, kind: &str, parse: F) -> Vec<T>
where
    F: Fn(D) -> std::result::Result<T, forgehub_models::ModelError>,
{
    documents
        .into_iter()
        .filter_map(|document| match parse(document) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(kind, error = %err, "Skipping malformed upstream document");
                None
            }
        })
        .collect()
}

#[async_trait]
impl Forge for ProxyForge {
    fn name(&self) -> &str {
        &self.url
    }

    async fn search_modules(&self, query: &ModuleQuery) -> Result<Vec<Module>> {
        let path = match &query.query {
            Some(query) => format!("/v3/modules?query={}", urlencoding::encode(query)),
            None => "/v3/modules".to_string(),
        };
        let documents: Vec<ModuleDocument> = self.get_all_pages(&path).await?;
        Ok(parse_all(documents, "module", Module::from_document))
    }

    async fn search_releases(&self, filter: &ReleaseFilter) -> Result<Vec<Release>> {
        let path = match &filter.module {
            Some(module) => format!("/v3/releases?module={}", urlencoding::encode(module)),
            None => "/v3/releases".to_string(),
        };
        let documents: Vec<ReleaseDocument> = self.get_all_pages(&path).await?;
        Ok(parse_all(documents, "release", Release::from_document))
    }

    async fn get_module_metadata(&self, author: &str, name: &str) -> Result<Module> {
        let document: ModuleDocument = self
            .get_json(&format!("/v3/modules/{author}-{name}"))
            .await?;
        Ok(Module::from_document(document)?)
    }

    async fn get_release_metadata(&self, author: &str, name: &str, version: &str) -> Result<Release> {
        let document: ReleaseDocument = self
            .get_json(&format!("/v3/releases/{author}-{name}-{version}"))
            .await?;
        Ok(Release::from_document(document)?)
    }

    async fn get_module_buffer(
        &self,
        author: &str,
        name: &str,
        version: &str,
    ) -> Result<ModuleBuffer> {
        let release = self.get_release_metadata(author, name, version).await?;
        self.download(&release.file_name(), release.file_uri()).await
    }

    async fn list_releases(&self, author: &str, name: &str) -> Result<Vec<Release>> {
        let releases = match self.legacy_releases(author, name).await? {
            Some(releases) => releases,
            None => {
                self.search_releases(&ReleaseFilter::for_module(&format!("{author}-{name}")))
                    .await?
            }
        };
        if releases.is_empty() {
            return Err(ForgeError::not_found(format!("{author}-{name}")));
        }
        Ok(releases)
    }

    async fn clear_cache(&self) {
        self.query_cache.clear().await;
        self.download_cache.clear().await;
    }
}
