use crate::api::AppState;
use crate::enrichment::TagQualityAnalysis;
use crate::error::{AppError, Result};
use crate::indexing::IndexingQueueStatus;
use crate::metrics::gather_metrics;
use crate::models::*;
use crate::search::{DeleteOutcome, SearchRequest, SearchResponse};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use validator::Validate;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Prometheus text exposition
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        gather_metrics(),
    )
}

/// Run a search
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let response = state.search.search(&request).await?;
    Ok(Json(response))
}

/// Enhance and index one work with immediate visibility
pub async fn index_work(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut record): Json<WorkRecord>,
) -> Result<Json<IndexWorkResponse>> {
    if record.id.is_empty() {
        record.id = id.clone();
    }
    if record.id != id {
        return Err(AppError::Validation(format!(
            "body id {} does not match path id {}",
            record.id, id
        )));
    }

    let written = state
        .pipeline
        .index_one(WorkIndexDocument::from(record))
        .await?;
    Ok(Json(IndexWorkResponse::from(&written)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IndexWorkResponse {
    pub work_id: String,
    pub version: u64,
    pub tagging_quality_score: f64,
    pub indexed_at: Option<DateTime<Utc>>,
}

impl From<&WorkIndexDocument> for IndexWorkResponse {
    fn from(doc: &WorkIndexDocument) -> Self {
        Self {
            work_id: doc.work_id.clone(),
            version: doc.version,
            tagging_quality_score: doc.tagging_quality_score,
            indexed_at: doc.indexed_at,
        }
    }
}

/// Remove one work from the index
pub async fn delete_work(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteWorkResponse>> {
    let outcome = state.pipeline.delete(&id).await?;
    Ok(Json(DeleteWorkResponse {
        work_id: id,
        outcome,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteWorkResponse {
    pub work_id: String,
    pub outcome: DeleteOutcome,
}

/// Run a bulk indexing job set to completion
pub async fn bulk_index(
    State(state): State<AppState>,
    Json(request): Json<BulkIndexRequest>,
) -> Result<Json<BulkIndexingResult>> {
    request.validate()?;

    let options = request.options.unwrap_or_else(|| state.bulk_defaults.clone());
    let cancel = CancellationToken::new();
    // a dropped request (client gone, timeout) cancels the run instead of
    // aborting it, so in-flight batches settle and counters stay accurate
    let guard = cancel.clone().drop_guard();
    let pipeline = state.pipeline.clone();
    let jobs = request.jobs;
    let run = tokio::spawn(async move { pipeline.index_bulk(jobs, &options, &cancel).await });

    let result = run
        .await
        .map_err(|e| AppError::Internal(format!("bulk indexing task failed: {}", e)))?;
    guard.disarm();
    Ok(Json(result))
}

#[derive(Debug, Deserialize, Validate)]
pub struct BulkIndexRequest {
    #[validate(length(min = 1, max = 10000))]
    pub jobs: Vec<IndexingJob>,
    #[serde(default)]
    pub options: Option<BulkIndexingOptions>,
}

/// Queue a job for background indexing
pub async fn submit_job(
    State(state): State<AppState>,
    Json(job): Json<IndexingJob>,
) -> Result<(StatusCode, Json<JobAccepted>)> {
    let accepted = JobAccepted {
        job_id: job.id,
        work_id: job.work_id.clone(),
        job_type: job.job_type,
    };
    state.queue.submit(job).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobAccepted {
    pub job_id: Uuid,
    pub work_id: String,
    pub job_type: JobType,
}

/// Background queue counters
pub async fn indexing_status(State(state): State<AppState>) -> Json<IndexingQueueStatus> {
    Json(state.queue.status())
}

/// Tag-quality analysis of a work without indexing it
pub async fn analyze_work(
    State(state): State<AppState>,
    Json(record): Json<WorkRecord>,
) -> Result<Json<TagQualityAnalysis>> {
    let doc = state.pipeline.enhancer().enhance_record(record);
    Ok(Json(state.analyzer.analyze(&doc)))
}
