//! Index client boundary

use crate::models::{RefreshPolicy, WorkIndexDocument};
use crate::search::builder::CompiledQuery;
use crate::search::error::SearchResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Result of deleting a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// One operation inside a bulk request
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOperation {
    Index(WorkIndexDocument),
    Delete(String),
}

impl BulkOperation {
    pub fn work_id(&self) -> &str {
        match self {
            BulkOperation::Index(doc) => &doc.work_id,
            BulkOperation::Delete(id) => id,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, BulkOperation::Delete(_))
    }
}

/// Per-item outcome of a bulk request, in request order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemResult {
    pub work_id: String,
    pub status: u16,
    pub error: Option<String>,
}

impl BulkItemResult {
    pub fn ok(work_id: impl Into<String>, status: u16) -> Self {
        Self {
            work_id: work_id.into(),
            status,
            error: None,
        }
    }

    pub fn failed(work_id: impl Into<String>, status: u16, error: impl Into<String>) -> Self {
        Self {
            work_id: work_id.into(),
            status,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One ranked hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub work_id: String,
    /// Relevance score; absent for unranked results
    pub score: Option<f64>,
    pub document: WorkIndexDocument,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub highlights: BTreeMap<String, Vec<String>>,
}

/// Raw answer of the index to a compiled query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexSearchResponse {
    pub total: u64,
    pub hits: Vec<SearchHit>,
    /// Aggregation buckets as returned by the index
    pub aggregations: Value,
    pub suggestions: Vec<String>,
    /// Time spent inside the index
    pub took_ms: u64,
}

/// Capability set of the external full-text index
#[async_trait]
pub trait IndexClient: Send + Sync {
    /// Insert or fully replace a document keyed by its `work_id`
    async fn upsert(&self, doc: &WorkIndexDocument, refresh: RefreshPolicy) -> SearchResult<()>;

    /// Remove a document; absence is reported, not an error
    async fn delete(&self, work_id: &str, refresh: RefreshPolicy) -> SearchResult<DeleteOutcome>;

    /// Fetch a document by id
    async fn get(&self, work_id: &str) -> SearchResult<Option<WorkIndexDocument>>;

    /// Execute a compiled query
    async fn search(&self, query: &CompiledQuery) -> SearchResult<IndexSearchResponse>;

    /// Submit operations together; an `Err` means the whole request failed
    async fn bulk(
        &self,
        operations: Vec<BulkOperation>,
        refresh: RefreshPolicy,
    ) -> SearchResult<Vec<BulkItemResult>>;
}
