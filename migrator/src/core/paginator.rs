//! Cursor-based walk over a paginated collection endpoint
//!
//! Pages are pulled on demand with [`CursorPaginator::next_page`] or consumed
//! as a stream via [`CursorPaginator::into_stream`]. A paginator is single
//! pass: once exhausted it keeps returning `None`.

use std::sync::Arc;

use futures_util::Stream;
use tracing::{debug, warn};

use crate::config::{MAX_PAGE_SIZE, PageFailurePolicy};
use crate::core::link_header::{CursorToken, PAGE_INFO_PARAM, parse_link_header};
use crate::core::retry::{RetryDecision, RetryPolicy};
use crate::error::{MigrationError, MigrationResult};
use crate::traits::{Sleeper, StoreApi};
use crate::types::ApiResponse;

/// One page of raw records
pub type Page = Vec<serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum WalkState {
    Fresh,
    Continue(CursorToken),
    Exhausted,
}

/// Walks `<resource>.json` to exhaustion following `Link` continuation tokens
pub struct CursorPaginator<'a, S: StoreApi + ?Sized> {
    client: &'a mut S,
    resource: String,
    collection_key: String,
    page_size: u32,
    filters: Vec<(String, String)>,
    state: WalkState,
    failure_policy: PageFailurePolicy,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    pages_fetched: usize,
    records_fetched: usize,
}

impl<'a, S: StoreApi + ?Sized> CursorPaginator<'a, S> {
    /// Create a paginator for `resource` (e.g. `orders`, `products`)
    pub fn new(client: &'a mut S, resource: impl Into<String>, sleeper: Arc<dyn Sleeper>) -> Self {
        let resource = resource.into();
        Self {
            client,
            collection_key: resource.clone(),
            resource,
            page_size: MAX_PAGE_SIZE,
            filters: Vec::new(),
            state: WalkState::Fresh,
            failure_policy: PageFailurePolicy::Propagate,
            retry: RetryPolicy::default(),
            sleeper,
            pages_fetched: 0,
            records_fetched: 0,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Extra query parameter sent on the first page only
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((key.into(), value.into()));
        self
    }

    /// JSON key holding the records when it differs from the resource name
    pub fn with_collection_key(mut self, key: impl Into<String>) -> Self {
        self.collection_key = key.into();
        self
    }

    pub fn with_failure_policy(mut self, policy: PageFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == WalkState::Exhausted
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn records_fetched(&self) -> usize {
        self.records_fetched
    }

    /// Path of the next request, `None` once exhausted
    pub fn next_request_path(&self) -> Option<String> {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("limit", &self.page_size.to_string());

        match &self.state {
            WalkState::Exhausted => return None,
            WalkState::Fresh => {
                for (key, value) in &self.filters {
                    query.append_pair(key, value);
                }
            }
            // The token already encodes the original filters
            WalkState::Continue(token) => {
                query.append_pair(PAGE_INFO_PARAM, token.as_str());
            }
        }

        Some(format!("/{}.json?{}", self.resource, query.finish()))
    }

    /// Fetch the next page; `Ok(None)` marks the end of the collection
    pub async fn next_page(&mut self) -> MigrationResult<Option<Page>> {
        let Some(path) = self.next_request_path() else {
            return Ok(None);
        };
        let page_number = self.pages_fetched + 1;

        let records = match self.fetch_with_retry(&path).await.and_then(|response| self.accept(response)) {
            Ok(records) => records,
            Err(error) => {
                self.state = WalkState::Exhausted;
                return match self.failure_policy {
                    PageFailurePolicy::Propagate => Err(MigrationError::CatalogWalk {
                        resource: self.resource.clone(),
                        page: page_number,
                        source: Box::new(error),
                    }),
                    PageFailurePolicy::Truncate => {
                        warn!(
                            "⚠️ Page {} of {} failed, ending walk after {} records: {}",
                            page_number, self.resource, self.records_fetched, error
                        );
                        Ok(None)
                    }
                };
            }
        };

        self.pages_fetched = page_number;
        self.records_fetched += records.len();
        debug!(
            "📄 Fetched page {} of {} ({} records, more: {})",
            page_number,
            self.resource,
            records.len(),
            !self.is_exhausted()
        );

        Ok(Some(records))
    }

    /// Consume the paginator as a lazy stream of pages
    pub fn into_stream(self) -> impl Stream<Item = MigrationResult<Page>> + 'a {
        futures_util::stream::unfold(self, |mut paginator| async move {
            match paginator.next_page().await {
                Ok(Some(page)) => Some((Ok(page), paginator)),
                Ok(None) => None,
                Err(error) => Some((Err(error), paginator)),
            }
        })
    }

    async fn fetch_with_retry(&mut self, path: &str) -> MigrationResult<ApiResponse> {
        let mut attempt = 1;
        loop {
            match self.client.get(path).await {
                Ok(response) => return Ok(response),
                Err(error) => match self.retry.decide(attempt, &error, MigrationError::is_transient) {
                    RetryDecision::RetryAfter(delay) => {
                        warn!(
                            "⏳ Fetching {} failed (attempt {}), retrying in {}ms: {}",
                            path,
                            attempt,
                            delay.as_millis(),
                            error
                        );
                        self.sleeper.sleep(delay).await;
                        attempt += 1;
                    }
                    RetryDecision::GiveUp => return Err(error),
                },
            }
        }
    }

    /// Pull the records out of a response and advance the cursor
    fn accept(&mut self, response: ApiResponse) -> MigrationResult<Page> {
        let links = response.header("link").map(parse_link_header).unwrap_or_default();

        let mut body = response.body;
        let records = match body.get_mut(&self.collection_key).map(serde_json::Value::take) {
            Some(serde_json::Value::Array(records)) => records,
            _ => {
                return Err(MigrationError::malformed(
                    self.resource.clone(),
                    format!("response has no `{}` array", self.collection_key),
                ));
            }
        };

        self.state = match (links.next, &self.state) {
            // A server echoing the same cursor would loop forever
            (Some(next), WalkState::Continue(current)) if next == *current => {
                warn!("⚠️ {} returned the cursor it was given, stopping walk", self.resource);
                WalkState::Exhausted
            }
            (Some(next), _) => WalkState::Continue(next),
            (None, _) => WalkState::Exhausted,
        };

        Ok(records)
    }
}
