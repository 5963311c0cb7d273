//! Cursor-following client for the paginated retail API.
//!
//! Every response is an envelope of the form
//!
//! ```json
//! {"payload": {"<name>": [ {...}, ... ], "next_page": "/api/v1/<name>?page=2"}}
//! ```
//!
//! and the last page carries `"next_page": null`.

use serde_json::Value as Json;
use tracing::{debug, info};
use url::Url;

use super::{join_url, FetchError, PageSource};
use crate::models::{Record, Table};

/// One decoded API response.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub records: Vec<Record>,

    /// Relative path of the following page, `None` on the last page
    pub next_page: Option<String>,
}

impl Page {
    /// Decode the envelope for dataset `name`.
    pub fn from_envelope(name: &str, url: &Url, body: &Json) -> Result<Self, FetchError> {
        let envelope_err = |reason: String| FetchError::Envelope {
            url: url.to_string(),
            reason,
        };

        let payload = body
            .get("payload")
            .and_then(Json::as_object)
            .ok_or_else(|| envelope_err("missing payload object".to_string()))?;

        let records = payload
            .get(name)
            .and_then(Json::as_array)
            .ok_or_else(|| envelope_err(format!("payload has no '{}' list", name)))?
            .iter()
            .map(|r| {
                r.as_object()
                    .cloned()
                    .ok_or_else(|| envelope_err(format!("'{}' entry is not an object", name)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let next_page = match payload.get("next_page") {
            Some(Json::Null) => None,
            Some(Json::String(path)) => Some(path.clone()),
            Some(other) => {
                return Err(envelope_err(format!("next_page is not a string: {}", other)))
            }
            None => return Err(envelope_err("payload has no next_page".to_string())),
        };

        Ok(Self { records, next_page })
    }
}

/// Walks the retail API's `next_page` cursors.
pub struct PageFetcher<P> {
    source: P,
    base_url: Url,
    api_path: String,
}

impl<P: PageSource> PageFetcher<P> {
    /// Create a fetcher rooted at `base_url`; listings live under
    /// `{base_url}{api_path}{name}`.
    pub fn new(source: P, base_url: Url, api_path: impl Into<String>) -> Self {
        Self {
            source,
            base_url,
            api_path: api_path.into(),
        }
    }

    pub fn source(&self) -> &P {
        &self.source
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of the first listing page for `name`.
    pub fn listing_url(&self, name: &str) -> Result<Url, FetchError> {
        join_url(&self.base_url, &format!("{}{}", self.api_path, name))
    }

    /// Fetch one page.
    pub async fn fetch_page(&self, name: &str, url: &Url) -> Result<Page, FetchError> {
        let body = self.source.get_json(url).await?;
        Page::from_envelope(name, url, &body)
    }

    /// Fetch every page of `name`, following `next_page` until it is null.
    pub async fn fetch_all(&self, name: &str) -> Result<Vec<Record>, FetchError> {
        let mut url = self.listing_url(name)?;
        let mut records = Vec::new();
        let mut pages = 0;

        loop {
            let page = self.fetch_page(name, &url).await?;
            pages += 1;
            debug!("{}: page {} had {} records", name, pages, page.records.len());
            records.extend(page.records);

            match page.next_page {
                Some(path) => url = join_url(&self.base_url, &path)?,
                None => break,
            }
        }

        info!("{}: fetched {} records over {} pages", name, records.len(), pages);
        Ok(records)
    }

    /// Fetch at most `max_pages` pages of `name` by page number.
    ///
    /// Requests `?page=1`, `?page=2`, ... and stops early at the first
    /// response whose body decodes to an empty structure.
    pub async fn fetch_paged(
        &self,
        name: &str,
        max_pages: usize,
    ) -> Result<Vec<Record>, FetchError> {
        let listing = self.listing_url(name)?;
        let mut records = Vec::new();

        for page_number in 1..=max_pages {
            let mut url = listing.clone();
            url.query_pairs_mut()
                .append_pair("page", &page_number.to_string());

            let body = self.source.get_json(&url).await?;
            if is_empty_body(&body) {
                debug!("{}: page {} is empty, stopping", name, page_number);
                break;
            }

            let page = Page::from_envelope(name, &url, &body)?;
            records.extend(page.records);
        }

        info!("{}: fetched {} records by page number", name, records.len());
        Ok(records)
    }

    /// [`fetch_all`](Self::fetch_all) collected into a table.
    pub async fn fetch_table(&self, name: &str) -> Result<Table, FetchError> {
        Ok(Table::from_records(&self.fetch_all(name).await?)?)
    }
}

fn is_empty_body(body: &Json) -> bool {
    match body {
        Json::Null => true,
        Json::Object(map) => map.is_empty(),
        Json::Array(items) => items.is_empty(),
        Json::String(s) => s.is_empty(),
        _ => false,
    }
}
