//! Generic cursor-based collection.
//!
//! Listing endpoints return `{ <dataKey>: [...], cursor? }`. The collector
//! threads the opaque cursor between requests, stopping when the target
//! count is reached, a page comes back empty, or the upstream stops
//! returning a cursor. The cursor parameter is only ever sent when the
//! previous response produced a non-empty one; the first request never
//! carries it.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::XrpcClient;
use crate::error::{Result, SkeinError};

/// One page of results plus the continuation token, if any.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub cursor: Option<String>,
}

/// The fetch capability the collector runs against.
#[async_trait]
pub trait PageSource<T>: Send + Sync {
    async fn page(&self, limit: usize, cursor: Option<&str>) -> Result<Page<T>>;
}

/// Batch-size tuning. The floor and ceiling are configuration, not
/// protocol; the server-side page cap is 100 for the endpoints used here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    /// Smallest batch a filtered collection will request.
    pub request_floor: usize,
    /// Server-side maximum page size.
    pub server_max: usize,
    /// How much to overfetch per request when a predicate will discard
    /// part of each page.
    pub overfetch_factor: usize,
    /// Request ceiling for filtered collection; a soft limit, not an
    /// error.
    pub max_requests: usize,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            request_floor: 25,
            server_max: 100,
            overfetch_factor: 3,
            max_requests: 10,
        }
    }
}

/// Collection outcome. `items.len() <= limit` always; `total_fetched`
/// counts pre-filter items, so it exceeds `items.len()` when a predicate
/// discarded some.
#[derive(Debug, Clone)]
pub struct PaginationResult<T> {
    pub items: Vec<T>,
    pub total_fetched: usize,
    pub request_count: usize,
}

/// Accumulate up to `limit` items from `source`.
pub async fn collect<T: Send>(
    source: &dyn PageSource<T>,
    limit: usize,
    config: &PageConfig,
) -> Result<PaginationResult<T>> {
    let mut items: Vec<T> = Vec::new();
    let mut cursor: Option<String> = None;
    let mut total_fetched = 0;
    let mut request_count = 0;

    while items.len() < limit {
        let remaining = limit - items.len();
        let want = remaining.min(config.server_max).max(1);

        let page = source.page(want, cursor.as_deref()).await?;
        request_count += 1;
        total_fetched += page.items.len();

        if page.items.is_empty() {
            break;
        }

        for item in page.items {
            if items.len() >= limit {
                break;
            }
            items.push(item);
        }

        match page.cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            // Absence of a cursor is always terminal
            _ => break,
        }
    }

    debug!(
        "collected {} items in {} requests ({} fetched)",
        items.len(),
        request_count,
        total_fetched
    );

    Ok(PaginationResult {
        items,
        total_fetched,
        request_count,
    })
}

/// Accumulate up to `limit` items matching `predicate`.
///
/// Requests larger batches than the remaining need to compensate for
/// filtering loss, and gives up (returning what it has) after
/// `config.max_requests` attempts so a predicate that matches nothing
/// still terminates.
pub async fn collect_filtered<T: Send>(
    source: &dyn PageSource<T>,
    predicate: impl Fn(&T) -> bool + Send + Sync,
    limit: usize,
    config: &PageConfig,
) -> Result<PaginationResult<T>> {
    let mut items: Vec<T> = Vec::new();
    let mut cursor: Option<String> = None;
    let mut total_fetched = 0;
    let mut request_count = 0;

    while items.len() < limit && request_count < config.max_requests {
        let remaining = limit - items.len();
        let want = (remaining.saturating_mul(config.overfetch_factor))
            .max(config.request_floor)
            .min(config.server_max)
            .max(1);

        let page = source.page(want, cursor.as_deref()).await?;
        request_count += 1;
        total_fetched += page.items.len();

        if page.items.is_empty() {
            break;
        }

        for item in page.items {
            if items.len() >= limit {
                break;
            }
            if predicate(&item) {
                items.push(item);
            }
        }

        match page.cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }

    debug!(
        "filtered collection kept {} of {} across {} requests",
        items.len(),
        total_fetched,
        request_count
    );

    Ok(PaginationResult {
        items,
        total_fetched,
        request_count,
    })
}

/// [`PageSource`] over one XRPC listing endpoint.
///
/// `data_key` names the item array in the response envelope (`feed`,
/// `posts`, ...). Items failing to match the expected shape fail the page
/// as a decode error; the upstream does not mix shapes within an endpoint.
pub struct XrpcPageSource<'a, T> {
    client: &'a XrpcClient,
    endpoint: &'static str,
    base_params: Vec<(String, String)>,
    data_key: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T> XrpcPageSource<'a, T> {
    pub fn new(
        client: &'a XrpcClient,
        endpoint: &'static str,
        base_params: Vec<(String, String)>,
        data_key: &'static str,
    ) -> Self {
        Self {
            client,
            endpoint,
            base_params,
            data_key,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: DeserializeOwned + Send + Sync> PageSource<T> for XrpcPageSource<'_, T> {
    async fn page(&self, limit: usize, cursor: Option<&str>) -> Result<Page<T>> {
        let mut params = self.base_params.clone();
        params.push(("limit".to_string(), limit.to_string()));
        if let Some(cursor) = cursor {
            params.push(("cursor".to_string(), cursor.to_string()));
        }

        let envelope = self.client.get(self.endpoint, &params).await?;

        let items = match envelope.get(self.data_key) {
            Some(array) => {
                serde_json::from_value(array.clone()).map_err(|e| SkeinError::Decode {
                    endpoint: self.endpoint.to_string(),
                    source: e,
                })?
            }
            None => Vec::new(),
        };

        let cursor = envelope
            .get("cursor")
            .and_then(|c| c.as_str())
            .map(str::to_owned);

        Ok(Page { items, cursor })
    }
}
