//! Async STAC client for searching spatio-temporal asset catalogs.
//!
//! Supports both Earth Search API versions out of the box, plus arbitrary
//! STAC API endpoints via [`StacCatalog::Custom`].

use std::time::Duration;

use reqwest::Response;
use serde_json::Value;

use crate::error::{CloudError, Result};
use crate::http::HttpClient;
use crate::stac_models::{StacItemCollection, StacLink, StacSearchParams};

// ---------------------------------------------------------------------------
// Catalog enum
// ---------------------------------------------------------------------------

/// Well-known STAC catalogs plus custom endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StacCatalog {
    /// AWS Earth Search v0 (Element 84), collection `sentinel-s2-l2a-cogs`.
    EarthSearchV0,
    /// AWS Earth Search v1 (Element 84), collection `sentinel-2-l2a`.
    EarthSearch,
    /// Any STAC API endpoint (provide the root URL, e.g.
    /// `"https://my-stac.example.com/api/v1"`).
    Custom(String),
}

impl StacCatalog {
    /// Return the full POST `/search` URL for this catalog.
    pub fn search_url(&self) -> String {
        match self {
            Self::EarthSearchV0 => "https://earth-search.aws.element84.com/v0/search".to_string(),
            Self::EarthSearch => "https://earth-search.aws.element84.com/v1/search".to_string(),
            Self::Custom(base) => {
                let base = base.trim_end_matches('/');
                if base.ends_with("/search") {
                    base.to_string()
                } else {
                    format!("{}/search", base)
                }
            }
        }
    }

    /// Parse a shorthand string into a catalog.
    ///
    /// Recognized shorthands: `"v0"`, `"es-v0"`, `"earth-search-v0"`,
    /// `"v1"`, `"es"`, `"earth-search"`. Anything else is treated as a
    /// custom URL.
    pub fn from_str_or_url(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "v0" | "es-v0" | "earth-search-v0" => Self::EarthSearchV0,
            "v1" | "es" | "earth-search" | "earthsearch" => Self::EarthSearch,
            _ => Self::Custom(s.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for [`StacClient`].
#[derive(Debug, Clone)]
pub struct StacClientOptions {
    /// Per-request timeout (default 30 s).
    pub request_timeout: Duration,
    /// Maximum retries on transient failures (default 3).
    pub max_retries: u32,
}

impl Default for StacClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Async client for STAC Item Search.
pub struct StacClient {
    catalog: StacCatalog,
    http: HttpClient,
}

impl StacClient {
    pub fn new(catalog: StacCatalog, options: StacClientOptions) -> Result<Self> {
        let http = HttpClient::new(options.request_timeout, options.max_retries)?;
        Ok(Self { catalog, http })
    }

    /// The catalog this client is configured for.
    pub fn catalog(&self) -> &StacCatalog {
        &self.catalog
    }

    // ── Single-page search ──────────────────────────────────────────

    /// Execute a single search request and return one page of results.
    pub async fn search(&self, params: &StacSearchParams) -> Result<StacItemCollection> {
        let url = self.catalog.search_url();
        self.post_search(&url, params).await
    }

    // ── Pagination ──────────────────────────────────────────────────

    /// Fetch the page behind a `next` link of a previous page.
    ///
    /// POST links resend the search body (merged with the link body when
    /// `merge` is set); GET links are fetched as-is.
    pub async fn next_page(
        &self,
        link: &StacLink,
        original_params: &StacSearchParams,
    ) -> Result<StacItemCollection> {
        let method = link.method.as_deref().unwrap_or("GET").to_uppercase();

        if method == "POST" {
            let body = next_body(link, original_params)?;
            self.post_search(&link.href, &body).await
        } else {
            let resp = self.http.send_with_retry(self.http.inner().get(&link.href)).await?;
            parse_page(resp, "STAC pagination").await
        }
    }

    // ── Private helpers ─────────────────────────────────────────────

    async fn post_search(&self, url: &str, body: &impl serde::Serialize) -> Result<StacItemCollection> {
        let request = self.http.inner().post(url).json(body);
        let resp = self.http.send_with_retry(request).await?;
        parse_page(resp, "STAC search").await
    }
}

/// Request body for a POST `next` link.
///
/// With `merge: true` the link body is overlaid onto the original request;
/// otherwise the link body replaces it.
fn next_body(link: &StacLink, original: &StacSearchParams) -> Result<Value> {
    let original = serde_json::to_value(original)
        .map_err(|e| CloudError::Network(format!("serializing params: {e}")))?;

    Ok(match (&link.body, link.merge.unwrap_or(false)) {
        (Some(Value::Object(extra)), true) => {
            let mut base = original;
            if let Some(obj) = base.as_object_mut() {
                for (k, v) in extra {
                    obj.insert(k.clone(), v.clone());
                }
            }
            base
        }
        (Some(body), false) => body.clone(),
        _ => original,
    })
}

async fn parse_page(resp: Response, what: &str) -> Result<StacItemCollection> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(CloudError::Network(format!(
            "{what} returned HTTP {status}: {}",
            body.chars().take(500).collect::<String>()
        )));
    }

    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| CloudError::Network(format!("parsing {what} response: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
