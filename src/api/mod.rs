pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::enrichment::TagAnalyzer;
use crate::indexing::{IndexingPipeline, IndexingQueue};
use crate::models::BulkIndexingOptions;
use crate::search::SearchService;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub search: Arc<SearchService>,
    pub pipeline: Arc<IndexingPipeline>,
    pub queue: Arc<IndexingQueue>,
    pub analyzer: Arc<TagAnalyzer>,
    /// Options used when a bulk request carries none
    pub bulk_defaults: BulkIndexingOptions,
    /// Deadline for a whole HTTP request
    pub request_timeout: Duration,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        search: Arc<SearchService>,
        pipeline: Arc<IndexingPipeline>,
        queue: Arc<IndexingQueue>,
    ) -> Self {
        let analyzer = Arc::new(TagAnalyzer::new(pipeline.enhancer().weights().clone()));
        Self {
            search,
            pipeline,
            queue,
            analyzer,
            bulk_defaults: BulkIndexingOptions::default(),
            request_timeout: Duration::from_secs(30),
            started_at: Instant::now(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the options applied to bulk requests without their own
    pub fn with_bulk_defaults(mut self, options: BulkIndexingOptions) -> Self {
        self.bulk_defaults = options;
        self
    }
}
