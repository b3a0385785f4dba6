//! Elasticsearch-compatible REST implementation of [`IndexClient`]

use crate::models::{RefreshPolicy, WorkIndexDocument};
use crate::search::builder::CompiledQuery;
use crate::search::client::{
    BulkItemResult, BulkOperation, DeleteOutcome, IndexClient, IndexSearchResponse, SearchHit,
};
use crate::search::config::SearchConfig;
use crate::search::error::{SearchError, SearchResult};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

/// REST client for the works index
#[derive(Clone)]
pub struct HttpIndexClient {
    client: Client,
    endpoint: String,
    /// `{endpoint}/{index}/_doc`, ids are appended as one encoded segment
    doc_base: Url,
    index: String,
    search_timeout: Duration,
    write_timeout: Duration,
    bulk_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct EsSearchResponse {
    #[serde(default)]
    took: u64,
    hits: EsHits,
    #[serde(default)]
    aggregations: Value,
    #[serde(default)]
    suggest: BTreeMap<String, Vec<EsSuggestEntry>>,
}

#[derive(Debug, Deserialize)]
struct EsHits {
    total: EsTotal,
    #[serde(default)]
    hits: Vec<EsHit>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EsTotal {
    Object { value: u64 },
    Count(u64),
}

impl EsTotal {
    fn value(&self) -> u64 {
        match self {
            EsTotal::Object { value } => *value,
            EsTotal::Count(count) => *count,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EsHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score", default)]
    score: Option<f64>,
    #[serde(rename = "_source")]
    source: WorkIndexDocument,
    #[serde(default)]
    highlight: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct EsSuggestEntry {
    #[serde(default)]
    options: Vec<EsSuggestOption>,
}

#[derive(Debug, Deserialize)]
struct EsSuggestOption {
    text: String,
}

#[derive(Debug, Deserialize)]
struct EsGetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<WorkIndexDocument>,
}

#[derive(Debug, Deserialize)]
struct EsBulkResponse {
    #[serde(default)]
    items: Vec<BTreeMap<String, EsBulkItem>>,
}

#[derive(Debug, Deserialize)]
struct EsBulkItem {
    #[serde(rename = "_id", default)]
    id: String,
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

impl HttpIndexClient {
    /// Create a client for the index named in `config`
    pub fn new(config: &SearchConfig) -> SearchResult<Self> {
        let client = Client::builder()
            .timeout(config.bulk_timeout())
            .build()
            .map_err(|e| {
                SearchError::InvalidConfiguration(format!("Failed to create HTTP client: {}", e))
            })?;

        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        let mut doc_base = Url::parse(&endpoint).map_err(|e| {
            SearchError::InvalidConfiguration(format!("Invalid index endpoint {}: {}", endpoint, e))
        })?;
        doc_base
            .path_segments_mut()
            .map_err(|_| {
                SearchError::InvalidConfiguration(format!(
                    "Index endpoint {} cannot carry a path",
                    endpoint
                ))
            })?
            .pop_if_empty()
            .push(&config.index_name)
            .push("_doc");

        Ok(Self {
            client,
            endpoint,
            doc_base,
            index: config.index_name.clone(),
            search_timeout: config.search_timeout(),
            write_timeout: config.write_timeout(),
            bulk_timeout: config.bulk_timeout(),
        })
    }

    fn doc_url(&self, work_id: &str) -> Url {
        let mut url = self.doc_base.clone();
        // doc_base was checked to be a base URL in new()
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(work_id);
        }
        url
    }

    /// Turn a non-success response into [`SearchError::Rejected`]
    async fn rejection(response: Response) -> SearchError {
        let status = response.status().as_u16();
        let reason = response
            .text()
            .await
            .unwrap_or_else(|e| format!("unreadable body: {}", e));
        SearchError::Rejected { status, reason }
    }

    fn transport(err: reqwest::Error, deadline: Duration) -> SearchError {
        if err.is_timeout() {
            SearchError::Timeout(deadline.as_millis() as u64)
        } else {
            SearchError::from(err)
        }
    }

    fn bulk_body(&self, operations: &[BulkOperation]) -> SearchResult<String> {
        let mut body = String::new();
        for op in operations {
            match op {
                BulkOperation::Index(doc) => {
                    let action = json!({ "index": { "_index": self.index, "_id": doc.work_id } });
                    body.push_str(&action.to_string());
                    body.push('\n');
                    body.push_str(&serde_json::to_string(doc)?);
                    body.push('\n');
                }
                BulkOperation::Delete(work_id) => {
                    let action = json!({ "delete": { "_index": self.index, "_id": work_id } });
                    body.push_str(&action.to_string());
                    body.push('\n');
                }
            }
        }
        Ok(body)
    }
}

fn error_reason(error: &Value) -> String {
    error
        .get("reason")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

#[async_trait]
impl IndexClient for HttpIndexClient {
    async fn upsert(&self, doc: &WorkIndexDocument, refresh: RefreshPolicy) -> SearchResult<()> {
        let response = self
            .client
            .put(self.doc_url(&doc.work_id))
            .query(&[("refresh", refresh.as_param())])
            .timeout(self.write_timeout)
            .json(doc)
            .send()
            .await
            .map_err(|e| Self::transport(e, self.write_timeout))?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        debug!(work_id = %doc.work_id, version = doc.version, "Document written to index");
        Ok(())
    }

    async fn delete(&self, work_id: &str, refresh: RefreshPolicy) -> SearchResult<DeleteOutcome> {
        let response = self
            .client
            .delete(self.doc_url(work_id))
            .query(&[("refresh", refresh.as_param())])
            .timeout(self.write_timeout)
            .send()
            .await
            .map_err(|e| Self::transport(e, self.write_timeout))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            Ok(DeleteOutcome::NotFound)
        } else if status.is_success() {
            Ok(DeleteOutcome::Deleted)
        } else {
            Err(Self::rejection(response).await)
        }
    }

    async fn get(&self, work_id: &str) -> SearchResult<Option<WorkIndexDocument>> {
        let response = self
            .client
            .get(self.doc_url(work_id))
            .timeout(self.write_timeout)
            .send()
            .await
            .map_err(|e| Self::transport(e, self.write_timeout))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let body: EsGetResponse = response.json().await?;
        Ok(if body.found { body.source } else { None })
    }

    async fn search(&self, query: &CompiledQuery) -> SearchResult<IndexSearchResponse> {
        let response = self
            .client
            .post(format!("{}/{}/_search", self.endpoint, self.index))
            .timeout(self.search_timeout)
            .json(&query.to_json())
            .send()
            .await
            .map_err(|e| Self::transport(e, self.search_timeout))?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let body: EsSearchResponse = response.json().await?;
        let suggestions = body
            .suggest
            .values()
            .flatten()
            .flat_map(|entry| entry.options.iter().map(|o| o.text.clone()))
            .collect();

        Ok(IndexSearchResponse {
            total: body.hits.total.value(),
            hits: body
                .hits
                .hits
                .into_iter()
                .map(|hit| SearchHit {
                    work_id: hit.id,
                    score: hit.score,
                    document: hit.source,
                    highlights: hit.highlight,
                })
                .collect(),
            aggregations: body.aggregations,
            suggestions,
            took_ms: body.took,
        })
    }

    async fn bulk(
        &self,
        operations: Vec<BulkOperation>,
        refresh: RefreshPolicy,
    ) -> SearchResult<Vec<BulkItemResult>> {
        if operations.is_empty() {
            return Ok(Vec::new());
        }

        let body = self.bulk_body(&operations)?;
        let response = self
            .client
            .post(format!("{}/_bulk", self.endpoint))
            .query(&[("refresh", refresh.as_param())])
            .timeout(self.bulk_timeout)
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| Self::transport(e, self.bulk_timeout))?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let body: EsBulkResponse = response.json().await?;
        if body.items.len() != operations.len() {
            warn!(
                expected = operations.len(),
                received = body.items.len(),
                "Bulk response item count mismatch"
            );
        }

        let results = operations
            .iter()
            .enumerate()
            .map(|(i, op)| {
                let item = body.items.get(i).and_then(|entry| entry.values().next());
                match item {
                    Some(item) => {
                        let work_id = if item.id.is_empty() {
                            op.work_id().to_string()
                        } else {
                            item.id.clone()
                        };
                        match &item.error {
                            Some(error) => {
                                BulkItemResult::failed(work_id, item.status, error_reason(error))
                            }
                            None => BulkItemResult::ok(work_id, item.status),
                        }
                    }
                    None => BulkItemResult::failed(op.work_id(), 500, "missing from bulk response"),
                }
            })
            .collect();

        Ok(results)
    }
}
