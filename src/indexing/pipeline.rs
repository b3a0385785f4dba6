//! Single and bulk indexing against an [`IndexClient`]

use crate::enrichment::DocumentEnhancer;
use crate::indexing::error::{IndexingError, IndexingResult};
use crate::metrics;
use crate::models::{
    BulkIndexingOptions, BulkIndexingResult, IndexingJob, JobOutcome, JobStatus, JobType,
    RefreshPolicy, WorkIndexDocument,
};
use crate::search::{BulkItemResult, BulkOperation, DeleteOutcome, IndexClient, SearchError};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const CANCELLED: &str = "cancelled";

/// A job tracked through a bulk run
#[derive(Debug)]
struct Tracked {
    /// Position in the caller's job list
    position: usize,
    job: IndexingJob,
    attempts: u32,
}

/// Writes enhanced documents to the index.
///
/// Versions are assigned per work id and only ever increase for the lifetime
/// of the pipeline.
pub struct IndexingPipeline {
    client: Arc<dyn IndexClient>,
    enhancer: DocumentEnhancer,
    versions: DashMap<String, u64>,
    write_timeout: Duration,
    bulk_timeout: Duration,
    completed_total: AtomicU64,
    failed_total: AtomicU64,
}

impl IndexingPipeline {
    pub fn new(client: Arc<dyn IndexClient>, enhancer: DocumentEnhancer) -> Self {
        Self {
            client,
            enhancer,
            versions: DashMap::new(),
            write_timeout: Duration::from_secs(10),
            bulk_timeout: Duration::from_secs(60),
            completed_total: AtomicU64::new(0),
            failed_total: AtomicU64::new(0),
        }
    }

    /// Override the single-write and bulk deadlines
    pub fn with_timeouts(mut self, write: Duration, bulk: Duration) -> Self {
        self.write_timeout = write;
        self.bulk_timeout = bulk;
        self
    }

    pub fn enhancer(&self) -> &DocumentEnhancer {
        &self.enhancer
    }

    /// Jobs completed across every bulk run of this pipeline
    pub fn completed_total(&self) -> u64 {
        self.completed_total.load(Ordering::Relaxed)
    }

    /// Jobs that ended failed across every bulk run of this pipeline
    pub fn failed_total(&self) -> u64 {
        self.failed_total.load(Ordering::Relaxed)
    }

    /// Next version for `work_id`, above both the ledger and the payload
    fn next_version(&self, work_id: &str, payload_version: u64) -> u64 {
        let mut entry = self.versions.entry(work_id.to_string()).or_insert(0);
        let next = (*entry).max(payload_version) + 1;
        *entry = next;
        next
    }

    fn prepare(&self, doc: WorkIndexDocument) -> WorkIndexDocument {
        let mut doc = self.enhancer.enhance(doc);
        doc.version = self.next_version(&doc.work_id, doc.version);
        metrics::TAGGING_QUALITY_SCORE.observe(doc.tagging_quality_score);
        doc
    }

    /// Enhance, version and write one document with immediate visibility
    pub async fn index_one(&self, doc: WorkIndexDocument) -> IndexingResult<WorkIndexDocument> {
        validate_document(&doc)?;
        let doc = self.prepare(doc);

        let result = match timeout(
            self.write_timeout,
            self.client.upsert(&doc, RefreshPolicy::Immediate),
        )
        .await
        {
            Ok(result) => result.map_err(IndexingError::from),
            Err(_) => Err(IndexingError::Timeout(self.write_timeout.as_millis() as u64)),
        };

        metrics::record_indexed("upsert", result.is_ok());
        match result {
            Ok(()) => {
                info!(work_id = %doc.work_id, version = doc.version, "Work indexed");
                Ok(doc)
            }
            Err(e) => {
                warn!(work_id = %doc.work_id, error = %e, "Failed to index work");
                Err(e)
            }
        }
    }

    /// Remove one document; a document that is already absent is success
    pub async fn delete(&self, work_id: &str) -> IndexingResult<DeleteOutcome> {
        if work_id.trim().is_empty() {
            return Err(IndexingError::Validation("work_id must not be empty".to_string()));
        }

        let result = match timeout(
            self.write_timeout,
            self.client.delete(work_id, RefreshPolicy::Immediate),
        )
        .await
        {
            Ok(result) => result.map_err(IndexingError::from),
            Err(_) => Err(IndexingError::Timeout(self.write_timeout.as_millis() as u64)),
        };

        metrics::record_indexed("delete", result.is_ok());
        let outcome = result?;
        if outcome == DeleteOutcome::NotFound {
            debug!(work_id, "Delete of absent work treated as success");
        } else {
            info!(work_id, "Work removed from index");
        }
        Ok(outcome)
    }

    /// Process jobs in batches with bounded concurrency.
    ///
    /// Every job ends in exactly one outcome, so `successful + failed` always
    /// equals the number of jobs passed in. Once `cancel` fires no further
    /// batch is submitted and unsubmitted jobs are reported as cancelled.
    pub async fn index_bulk(
        &self,
        jobs: Vec<IndexingJob>,
        options: &BulkIndexingOptions,
        cancel: &CancellationToken,
    ) -> BulkIndexingResult {
        let started = Instant::now();
        let total_jobs = jobs.len();
        let batch_size = options.batch_size.max(1);
        let concurrency = options.max_concurrency.max(1);

        let mut finished: Vec<Tracked> = Vec::with_capacity(total_jobs);
        let mut pending: Vec<Tracked> = Vec::with_capacity(total_jobs);

        for (position, job) in jobs.into_iter().enumerate() {
            let mut tracked = Tracked {
                position,
                job,
                attempts: 0,
            };
            match self.admit(&mut tracked.job) {
                Ok(()) => pending.push(tracked),
                Err(reason) => {
                    abandon(&mut tracked.job, reason);
                    finished.push(tracked);
                }
            }
        }

        let mut round = 0u32;
        while !pending.is_empty() {
            round += 1;
            let batches: Vec<Vec<Tracked>> = chunk(pending, batch_size);
            debug!(round, batches = batches.len(), "Submitting bulk round");

            let results: Vec<Vec<Tracked>> = stream::iter(batches)
                .map(|batch| self.run_batch(batch, options, cancel))
                .buffer_unordered(concurrency)
                .collect()
                .await;

            let mut retry = Vec::new();
            for tracked in results.into_iter().flatten() {
                let retryable = options.enable_retries
                    && tracked.job.can_retry()
                    && tracked.job.last_error.as_deref() != Some(CANCELLED);
                if retryable {
                    retry.push(tracked);
                } else {
                    finished.push(tracked);
                }
            }

            if retry.is_empty() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(options.retry_delay()) => {}
            }
            if cancel.is_cancelled() {
                finished.extend(retry);
                break;
            }

            pending = Vec::with_capacity(retry.len());
            for mut tracked in retry {
                match tracked.job.transition(JobStatus::Pending) {
                    Ok(()) => pending.push(tracked),
                    Err(e) => {
                        warn!(job_id = %tracked.job.id, error = %e, "Job could not be requeued");
                        finished.push(tracked);
                    }
                }
            }
        }

        finished.sort_by_key(|t| t.position);
        let outcomes: Vec<JobOutcome> = finished.into_iter().map(outcome).collect();
        let successful = outcomes.iter().filter(|o| o.is_success()).count();
        let failed = total_jobs - successful;

        for o in &outcomes {
            metrics::record_indexed(&o.job_type.to_string(), o.is_success());
        }
        self.completed_total
            .fetch_add(successful as u64, Ordering::Relaxed);
        self.failed_total.fetch_add(failed as u64, Ordering::Relaxed);

        let elapsed = started.elapsed();
        let throughput = if total_jobs == 0 {
            0.0
        } else {
            total_jobs as f64 / elapsed.as_secs_f64().max(0.001)
        };

        info!(
            total_jobs,
            successful,
            failed,
            rounds = round,
            duration_ms = elapsed.as_millis() as u64,
            "Bulk indexing finished"
        );

        BulkIndexingResult {
            total_jobs,
            successful,
            failed,
            duration_ms: elapsed.as_millis() as u64,
            throughput,
            cancelled: cancel.is_cancelled(),
            outcomes,
        }
    }

    /// Reset a job for a fresh run and enhance its payload
    fn admit(&self, job: &mut IndexingJob) -> Result<(), String> {
        job.status = JobStatus::Pending;
        job.last_error = None;

        if job.work_id.trim().is_empty() {
            return Err("work_id must not be empty".to_string());
        }
        if !job.job_type.is_write() {
            return Ok(());
        }

        let mut doc = job
            .document
            .take()
            .ok_or_else(|| format!("{} job for {} has no document", job.job_type, job.work_id))?;
        if doc.work_id.is_empty() {
            doc.work_id = job.work_id.clone();
        }
        if doc.work_id != job.work_id {
            return Err(format!(
                "document id {} does not match job work_id {}",
                doc.work_id, job.work_id
            ));
        }
        validate_document(&doc).map_err(|e| e.to_string())?;
        job.document = Some(self.prepare(doc));
        Ok(())
    }

    async fn run_batch(
        &self,
        mut batch: Vec<Tracked>,
        options: &BulkIndexingOptions,
        cancel: &CancellationToken,
    ) -> Vec<Tracked> {
        if cancel.is_cancelled() {
            for tracked in batch.iter_mut() {
                abandon(&mut tracked.job, CANCELLED.to_string());
            }
            metrics::BULK_BATCHES_TOTAL
                .with_label_values(&["cancelled"])
                .inc();
            return batch;
        }

        let started = Instant::now();
        let operations: Vec<BulkOperation> = batch
            .iter_mut()
            .map(|tracked| {
                tracked.attempts += 1;
                settle(&mut tracked.job, JobStatus::Processing, None);
                operation(&tracked.job)
            })
            .collect();

        let result = match timeout(
            self.bulk_timeout,
            self.client.bulk(operations, options.refresh_policy),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SearchError::Timeout(self.bulk_timeout.as_millis() as u64)),
        };

        match result {
            Ok(items) => {
                for (i, tracked) in batch.iter_mut().enumerate() {
                    apply_item(&mut tracked.job, items.get(i));
                }
                metrics::record_batch("ok", started.elapsed().as_secs_f64());
            }
            Err(e) => {
                warn!(jobs = batch.len(), error = %e, "Bulk batch failed");
                let reason = e.to_string();
                for tracked in batch.iter_mut() {
                    settle(&mut tracked.job, JobStatus::Failed, Some(reason.clone()));
                }
                metrics::record_batch("transport_error", started.elapsed().as_secs_f64());
            }
        }
        batch
    }
}

fn validate_document(doc: &WorkIndexDocument) -> IndexingResult<()> {
    if doc.work_id.trim().is_empty() {
        return Err(IndexingError::Validation("work_id must not be empty".to_string()));
    }
    if doc.title.trim().is_empty() {
        return Err(IndexingError::Validation(format!(
            "work {} has an empty title",
            doc.work_id
        )));
    }
    Ok(())
}

fn chunk(jobs: Vec<Tracked>, size: usize) -> Vec<Vec<Tracked>> {
    let mut batches = Vec::with_capacity(jobs.len().div_ceil(size));
    let mut current = Vec::with_capacity(size);
    for tracked in jobs {
        current.push(tracked);
        if current.len() == size {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(size)));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

fn operation(job: &IndexingJob) -> BulkOperation {
    match (&job.document, job.job_type) {
        (Some(doc), JobType::Create | JobType::Update) => BulkOperation::Index(doc.clone()),
        _ => BulkOperation::Delete(job.work_id.clone()),
    }
}

fn apply_item(job: &mut IndexingJob, item: Option<&BulkItemResult>) {
    match item {
        Some(item) if item.is_success() => settle(job, JobStatus::Completed, None),
        // deleting an absent document is not a failure
        Some(item) if item.status == 404 && job.job_type == JobType::Delete => {
            settle(job, JobStatus::Completed, None)
        }
        Some(item) => {
            let reason = item
                .error
                .clone()
                .unwrap_or_else(|| format!("index returned status {}", item.status));
            settle(job, JobStatus::Failed, Some(reason));
        }
        None => settle(
            job,
            JobStatus::Failed,
            Some("missing from bulk response".to_string()),
        ),
    }
}

fn settle(job: &mut IndexingJob, next: JobStatus, error: Option<String>) {
    if let Err(e) = job.transition(next) {
        warn!(job_id = %job.id, error = %e, "Rejected job transition");
        return;
    }
    // an earlier attempt's error does not outlive a new attempt
    job.last_error = error;
}

/// Fail a job that never reached the index
fn abandon(job: &mut IndexingJob, reason: String) {
    settle(job, JobStatus::Failed, Some(reason));
}

fn outcome(tracked: Tracked) -> JobOutcome {
    let job = tracked.job;
    let version = match (&job.document, job.status) {
        (Some(doc), JobStatus::Completed) => Some(doc.version),
        _ => None,
    };
    JobOutcome {
        job_id: job.id,
        work_id: job.work_id,
        job_type: job.job_type,
        status: job.status,
        attempts: tracked.attempts,
        version,
        error: job.last_error,
    }
}
