//! Canned-response page source.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use url::Url;

use super::{FetchError, PageSource};

/// [`PageSource`] that serves fixed bodies keyed by absolute URL and counts
/// the requests it answers. Unknown URLs get a 404.
#[derive(Debug, Default)]
pub struct StaticSource {
    bodies: HashMap<String, String>,
    requests: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` verbatim for `url`.
    pub fn with_text(mut self, url: &str, body: impl Into<String>) -> Self {
        self.bodies.insert(url.to_string(), body.into());
        self
    }

    /// Serve the JSON encoding of `body` for `url`.
    pub fn with_json(self, url: &str, body: serde_json::Value) -> Self {
        self.with_text(url, body.to_string())
    }

    /// Number of requests answered so far, including 404s.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// URLs requested so far, in order.
    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PageSource for StaticSource {
    async fn get_text(&self, url: &Url) -> Result<String, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut urls) = self.requested.lock() {
            urls.push(url.to_string());
        }

        self.bodies
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| FetchError::HttpStatus {
                url: url.to_string(),
                status: 404,
                message: "Not Found".to_string(),
            })
    }
}
