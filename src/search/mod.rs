//! Work search backed by an Elasticsearch-compatible index
//!
//! This module turns caller search requests into structured index queries and
//! turns index answers into paged responses:
//!
//! - **Query Building**: free text, field-scoped text, tag logic, metadata and range filters
//! - **Ranking**: recency and popularity boosts that never gate eligibility
//! - **Faceting**: tag, metadata, word-count, quality and publish-year buckets
//! - **Fallback**: unranked datastore search when the index is unavailable
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │           Search Service                         │
//! ├─────────────────────────────────────────────────┤
//! │  - search()        - datastore fallback          │
//! │  - facets          - analytics                   │
//! └─────────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────────┐
//! │           Query Builder                          │
//! ├─────────────────────────────────────────────────┤
//! │  - SearchRequest validation                      │
//! │  - Query tree + sort + aggregations              │
//! └─────────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────────┐
//! │           IndexClient                            │
//! ├─────────────────────────────────────────────────┤
//! │  - HttpIndexClient (REST, NDJSON bulk)           │
//! │  - InMemoryIndex (in-process evaluation)         │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use archive_search::search::{HttpIndexClient, SearchConfig, SearchRequest, SearchService};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SearchConfig::default();
//!     let client = Arc::new(HttpIndexClient::new(&config)?);
//!     let search = SearchService::new(client, config);
//!
//!     let request = SearchRequest::text("found family").with_page(1, 20);
//!     let response = search.search(&request).await?;
//!     println!("Found {} works", response.total);
//!
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod error;
pub mod facets;
pub mod http_client;
pub mod memory;
pub mod query;
pub mod request;
pub mod service;
pub mod store;

pub use builder::{CompiledQuery, QueryBuilder, SortClause};
pub use client::{
    BulkItemResult, BulkOperation, DeleteOutcome, IndexClient, IndexSearchResponse, SearchHit,
};
pub use config::{FacetConfig, SearchConfig, SearchConfigBuilder};
pub use error::{SearchError, SearchResult};
pub use facets::{Aggregation, FacetValue};
pub use http_client::HttpIndexClient;
pub use memory::InMemoryIndex;
pub use query::{BoolQuery, Query};
pub use request::{
    DateRange, NumericRange, SearchRequest, SortField, SortOrder, TagCategory, TagLogic,
};
pub use service::{SearchAnalytics, SearchResponse, SearchService};
pub use store::{InMemoryWorkStore, WorkStore};
