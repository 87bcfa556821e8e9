//! HTTP access to upstream forges.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::{Client, Response};
use thiserror::Error;
use tokio_util::io::StreamReader;
use url::Url;

use crate::buffer::ModuleBuffer;
use crate::error::{ForgeError, Result};

pub const USER_AGENT: &str = concat!("forgehub/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },
}

impl HttpError {
    /// 404 and 410 both mean the resource does not exist upstream.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404 | 410, .. })
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Status { url, .. } | Self::Request { url, .. } => url,
        }
    }
}

/// Minimal client interface used by the proxy forge
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Fetch a whole response body.
    async fn get(&self, url: &str) -> std::result::Result<Bytes, HttpError>;

    /// Fetch a response body as a stream.
    async fn download(&self, url: &str) -> std::result::Result<ModuleBuffer, HttpError>;
}

/// `HttpClient` backed by reqwest
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_default(),
        }
    }

    async fn send(&self, url: &str) -> std::result::Result<Response, HttpError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| HttpError::Request {
                url: url.to_string(),
                message: err.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(HttpError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> std::result::Result<Bytes, HttpError> {
        self.send(url)
            .await?
            .bytes()
            .await
            .map_err(|err| HttpError::Request {
                url: url.to_string(),
                message: err.to_string(),
            })
    }

    async fn download(&self, url: &str) -> std::result::Result<ModuleBuffer, HttpError> {
        let response = self.send(url).await?;
        let size = response.content_length();
        let stream = response.bytes_stream().map_err(std::io::Error::other);
        Ok(ModuleBuffer::from_reader(StreamReader::new(stream), size))
    }
}

/// Validate an upstream base URL and strip trailing slashes.
pub fn normalize_base_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url.trim())
        .map_err(|err| ForgeError::InvalidConfig(format!("invalid forge URL {url}: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ForgeError::InvalidConfig(format!(
            "unsupported scheme in forge URL {url}"
        )));
    }
    Ok(url.trim().trim_end_matches('/').to_string())
}

/// Join a normalized base URL and a path with exactly one slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
