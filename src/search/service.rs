//! Main search service implementation

use crate::metrics;
use crate::models::WorkIndexDocument;
use crate::search::builder::QueryBuilder;
use crate::search::client::{IndexClient, SearchHit};
use crate::search::config::SearchConfig;
use crate::search::error::{SearchError, SearchResult};
use crate::search::facets::{query_complexity, result_score, summarize_facets, FacetValue};
use crate::search::request::{SearchRequest, TagCategory};
use crate::search::store::WorkStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Request-level analytics returned with every response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchAnalytics {
    pub query_complexity: u32,
    pub result_score: f64,
    pub filters_applied: u32,
}

/// Search response with results and metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,

    /// Total number of hits (before pagination)
    pub total: u64,

    pub page: u32,
    pub limit: u32,

    /// `ceil(total / limit)`
    pub pages: u64,

    /// Wall-clock time of the whole search in milliseconds
    pub search_time_ms: u64,

    /// Time reported by the index itself
    pub query_time_ms: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub facets: Option<BTreeMap<String, Vec<FacetValue>>>,

    pub suggestions: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub did_you_mean: Option<String>,

    /// Served unranked from the datastore because the index failed
    pub degraded: bool,

    pub analytics: SearchAnalytics,
}

/// Main search service
pub struct SearchService {
    client: Arc<dyn IndexClient>,
    store: Option<Arc<dyn WorkStore>>,
    builder: QueryBuilder,
    config: SearchConfig,
}

impl SearchService {
    pub fn new(client: Arc<dyn IndexClient>, config: SearchConfig) -> Self {
        Self {
            client,
            store: None,
            builder: QueryBuilder::new(config.facets.clone()),
            config,
        }
    }

    /// Attach the datastore used when the index is unavailable
    pub fn with_store(mut self, store: Arc<dyn WorkStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn client(&self) -> Arc<dyn IndexClient> {
        Arc::clone(&self.client)
    }

    /// Search for works.
    ///
    /// Invalid requests are rejected before the index is contacted. Transport
    /// failures and timeouts fall back to the datastore when one is attached.
    pub async fn search(&self, request: &SearchRequest) -> SearchResult<SearchResponse> {
        let start_time = Instant::now();
        let compiled = match self.builder.build(request) {
            Ok(compiled) => compiled,
            Err(e) => {
                metrics::SEARCHES_TOTAL.with_label_values(&["error"]).inc();
                return Err(e);
            }
        };

        let timeout = self.config.search_timeout();
        let outcome = match tokio::time::timeout(timeout, self.client.search(&compiled)).await {
            Ok(result) => result,
            Err(_) => Err(SearchError::Timeout(timeout.as_millis() as u64)),
        };

        let raw = match outcome {
            Ok(raw) => raw,
            Err(e) if e.is_transport() => {
                return self.fallback(request, e, start_time).await;
            }
            Err(e) => {
                metrics::record_search("error", "index", start_time.elapsed().as_secs_f64());
                return Err(e);
            }
        };

        let search_time_ms = start_time.elapsed().as_millis() as u64;
        let facets = request
            .include_facets
            .then(|| summarize_facets(&raw.aggregations, raw.total));
        let did_you_mean = raw.suggestions.first().cloned();

        debug!(
            total = raw.total,
            took_ms = raw.took_ms,
            search_time_ms,
            "Search executed"
        );
        metrics::record_search("ok", "index", start_time.elapsed().as_secs_f64());

        Ok(SearchResponse {
            total: raw.total,
            page: request.page,
            limit: request.limit,
            pages: page_count(raw.total, request.limit),
            search_time_ms,
            query_time_ms: raw.took_ms,
            facets,
            suggestions: raw.suggestions,
            did_you_mean,
            degraded: false,
            analytics: analytics(request, raw.total, search_time_ms),
            results: raw.hits,
        })
    }

    async fn fallback(
        &self,
        request: &SearchRequest,
        cause: SearchError,
        start_time: Instant,
    ) -> SearchResult<SearchResponse> {
        let store = match (&self.store, self.config.datastore_fallback) {
            (Some(store), true) => store,
            _ => {
                metrics::record_search("error", "index", start_time.elapsed().as_secs_f64());
                return Err(cause);
            }
        };

        warn!(error = %cause, "Index search failed, falling back to datastore");
        let (works, total) = store
            .search_works(request, request.offset(), request.limit as usize)
            .await?;

        let results = works
            .into_iter()
            .map(|work| {
                let document = WorkIndexDocument::from(work);
                SearchHit {
                    work_id: document.work_id.clone(),
                    score: None,
                    document,
                    highlights: BTreeMap::new(),
                }
            })
            .collect();

        let search_time_ms = start_time.elapsed().as_millis() as u64;
        info!(total, search_time_ms, "Served degraded search from datastore");
        metrics::record_search("fallback", "datastore", start_time.elapsed().as_secs_f64());

        Ok(SearchResponse {
            results,
            total,
            page: request.page,
            limit: request.limit,
            pages: page_count(total, request.limit),
            search_time_ms,
            query_time_ms: 0,
            facets: None,
            suggestions: Vec::new(),
            did_you_mean: None,
            degraded: true,
            analytics: analytics(request, total, search_time_ms),
        })
    }
}

fn page_count(total: u64, limit: u32) -> u64 {
    if limit == 0 {
        0
    } else {
        total.div_ceil(u64::from(limit))
    }
}

/// Number of filter groups narrowing the result set
fn filters_applied(request: &SearchRequest) -> u32 {
    let tag_filters = TagCategory::ALL
        .iter()
        .filter(|c| !request.tags_for(**c).is_empty())
        .count();
    let list_filters = [
        &request.ratings,
        &request.categories,
        &request.warnings,
        &request.statuses,
        &request.languages,
        &request.exclude_works,
    ]
    .iter()
    .filter(|values| !values.is_empty())
    .count();
    let range_filters = [
        &request.word_count,
        &request.chapter_count,
        &request.hits,
        &request.kudos,
        &request.comments,
        &request.bookmarks,
    ]
    .iter()
    .filter(|range| !range.is_empty())
    .count();
    let date_filters = [&request.published, &request.updated]
        .iter()
        .filter(|range| range.after.is_some() || range.before.is_some())
        .count();
    let flags = usize::from(request.is_complete.is_some())
        + usize::from(request.min_tagging_quality.is_some())
        + usize::from(request.exclude_poorly_tagged);

    (tag_filters + list_filters + range_filters + date_filters + flags) as u32
}

fn analytics(request: &SearchRequest, total: u64, search_time_ms: u64) -> SearchAnalytics {
    SearchAnalytics {
        query_complexity: query_complexity(request),
        result_score: result_score(total, search_time_ms),
        filters_applied: filters_applied(request),
    }
}
