//! HTTP fetching.
//!
//! [`PageSource`] is the seam between the pipeline and the network:
//! [`HttpSource`] issues real requests with reqwest, [`StaticSource`]
//! answers from canned bodies. [`PageFetcher`] walks the paginated retail
//! API on top of either.
//!
//! There is no retry and no backoff: any transport error, non-success
//! status or undecodable body aborts the fetch.

mod paginate;
mod static_source;

pub use paginate::{Page, PageFetcher};
pub use static_source::StaticSource;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::models::TableError;

/// Errors that can occur during fetching.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP {status} for {url}: {message}")]
    HttpStatus {
        url: String,
        status: u16,
        message: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected response shape from {url}: {reason}")]
    Envelope { url: String, reason: String },

    #[error("Invalid user agent {0:?}")]
    InvalidUserAgent(String),

    #[error("Cannot build table from records: {0}")]
    Table(#[from] TableError),
}

/// Something that answers GET requests.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// GET `url` and return the body as text.
    async fn get_text(&self, url: &Url) -> Result<String, FetchError>;

    /// GET `url` and decode the body as JSON.
    async fn get_json(&self, url: &Url) -> Result<serde_json::Value, FetchError> {
        let body = self.get_text(url).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Configuration for the HTTP client.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,

    /// User agent string
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            user_agent: format!("retail-prep/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// [`PageSource`] backed by a reqwest client.
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    /// Create a new HTTP source with the given configuration.
    pub fn new(config: HttpConfig) -> Result<Self, FetchError> {
        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|_| FetchError::InvalidUserAgent(config.user_agent.clone()))?;
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, user_agent);

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Create an HTTP source with default configuration.
    pub fn with_defaults() -> Result<Self, FetchError> {
        Self::new(HttpConfig::default())
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn get_text(&self, url: &Url) -> Result<String, FetchError> {
        info!("Fetching {}", url);

        let response = self.client.get(url.as_str()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let body = response.text().await?;
        debug!("Received {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

/// Resolve `path` against `base`, mapping parse failures to [`FetchError`].
pub fn join_url(base: &Url, path: &str) -> Result<Url, FetchError> {
    base.join(path)
        .map_err(|e| FetchError::InvalidUrl(format!("{} + {}: {}", base, path, e)))
}
