//! Background indexing queue.
//!
//! Jobs submitted here are buffered by a single worker task and flushed
//! through [`IndexingPipeline::index_bulk`] whenever `batch_size` jobs are
//! waiting or `flush_interval` elapses, whichever comes first.

use crate::indexing::error::{IndexingError, IndexingResult};
use crate::indexing::pipeline::IndexingPipeline;
use crate::metrics;
use crate::models::{BulkIndexingOptions, IndexingJob};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Snapshot of queue activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingQueueStatus {
    /// Submitted, not yet flushed
    pub pending: u64,
    /// Inside a running flush
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    pub flushes: u64,
    /// Completed jobs per second since the queue started
    pub indexing_rate: f64,
    /// Share of finished jobs that failed, 0.0 to 1.0
    pub error_rate: f64,
    pub last_flush_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct QueueStats {
    pending: AtomicU64,
    processing: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    flushes: AtomicU64,
    last_flush_at: Mutex<Option<DateTime<Utc>>>,
    started_at: Instant,
}

impl QueueStats {
    fn new() -> Self {
        Self {
            pending: AtomicU64::new(0),
            processing: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            last_flush_at: Mutex::new(None),
            started_at: Instant::now(),
        }
    }
}

/// Handle to the background indexing worker
pub struct IndexingQueue {
    sender: mpsc::Sender<IndexingJob>,
    stats: Arc<QueueStats>,
    shutdown: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl IndexingQueue {
    /// Spawn the worker; must be called inside a Tokio runtime
    pub fn start(
        pipeline: Arc<IndexingPipeline>,
        options: BulkIndexingOptions,
        capacity: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let stats = Arc::new(QueueStats::new());
        let shutdown = CancellationToken::new();

        let worker = tokio::spawn(run_worker(
            receiver,
            pipeline,
            options.clone(),
            Arc::clone(&stats),
            shutdown.clone(),
        ));

        info!(
            capacity,
            batch_size = options.batch_size,
            flush_interval_secs = options.flush_interval_secs,
            "Indexing queue started"
        );

        Self {
            sender,
            stats,
            shutdown,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Enqueue a job; waits while the queue is full
    pub async fn submit(&self, job: IndexingJob) -> IndexingResult<()> {
        if self.shutdown.is_cancelled() {
            return Err(IndexingError::QueueClosed);
        }
        self.stats.pending.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(job).await.is_err() {
            self.stats.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(IndexingError::QueueClosed);
        }
        metrics::INDEXING_QUEUE_DEPTH.set(self.stats.pending.load(Ordering::SeqCst) as f64);
        Ok(())
    }

    pub fn status(&self) -> IndexingQueueStatus {
        let completed = self.stats.completed.load(Ordering::SeqCst);
        let failed = self.stats.failed.load(Ordering::SeqCst);
        let elapsed = self.stats.started_at.elapsed().as_secs_f64();
        let finished = completed + failed;

        IndexingQueueStatus {
            pending: self.stats.pending.load(Ordering::SeqCst),
            processing: self.stats.processing.load(Ordering::SeqCst),
            completed,
            failed,
            flushes: self.stats.flushes.load(Ordering::SeqCst),
            indexing_rate: if elapsed > 0.0 {
                completed as f64 / elapsed
            } else {
                0.0
            },
            error_rate: if finished > 0 {
                failed as f64 / finished as f64
            } else {
                0.0
            },
            last_flush_at: *self.stats.last_flush_at.lock(),
        }
    }

    /// Flush everything still queued and stop the worker
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Indexing queue worker panicked");
            }
        }
        info!("Indexing queue stopped");
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<IndexingJob>,
    pipeline: Arc<IndexingPipeline>,
    options: BulkIndexingOptions,
    stats: Arc<QueueStats>,
    shutdown: CancellationToken,
) {
    let batch_size = options.batch_size.max(1);
    let mut buffer: Vec<IndexingJob> = Vec::with_capacity(batch_size);
    let mut ticker = tokio::time::interval(options.flush_interval().max(Duration::from_millis(10)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                // refuse new sends, then take everything already accepted
                receiver.close();
                while let Some(job) = receiver.recv().await {
                    buffer.push(job);
                }
                flush(&pipeline, &options, &stats, &mut buffer).await;
                break;
            }
            received = receiver.recv() => match received {
                Some(job) => {
                    buffer.push(job);
                    if buffer.len() >= batch_size {
                        flush(&pipeline, &options, &stats, &mut buffer).await;
                    }
                }
                None => {
                    flush(&pipeline, &options, &stats, &mut buffer).await;
                    break;
                }
            },
            _ = ticker.tick() => {
                flush(&pipeline, &options, &stats, &mut buffer).await;
            }
        }
    }
}

async fn flush(
    pipeline: &IndexingPipeline,
    options: &BulkIndexingOptions,
    stats: &QueueStats,
    buffer: &mut Vec<IndexingJob>,
) {
    if buffer.is_empty() {
        return;
    }

    let jobs = std::mem::take(buffer);
    let count = jobs.len() as u64;
    stats.pending.fetch_sub(count, Ordering::SeqCst);
    stats.processing.fetch_add(count, Ordering::SeqCst);
    metrics::INDEXING_QUEUE_DEPTH.set(stats.pending.load(Ordering::SeqCst) as f64);

    // a fresh token so that shutdown still drains the final flush
    let result = pipeline
        .index_bulk(jobs, options, &CancellationToken::new())
        .await;

    stats.processing.fetch_sub(count, Ordering::SeqCst);
    stats
        .completed
        .fetch_add(result.successful as u64, Ordering::SeqCst);
    stats.failed.fetch_add(result.failed as u64, Ordering::SeqCst);
    stats.flushes.fetch_add(1, Ordering::SeqCst);
    *stats.last_flush_at.lock() = Some(Utc::now());

    info!(
        jobs = count,
        successful = result.successful,
        failed = result.failed,
        duration_ms = result.duration_ms,
        "Indexing queue flushed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::DocumentEnhancer;
    use crate::models::WorkIndexDocument;
    use crate::search::InMemoryIndex;

    fn job(id: &str) -> IndexingJob {
        IndexingJob::create(WorkIndexDocument::new(id, "Title", Utc::now()))
    }

    fn queue(index: Arc<InMemoryIndex>, batch_size: usize, flush_secs: u64) -> IndexingQueue {
        let pipeline = Arc::new(IndexingPipeline::new(index, DocumentEnhancer::default()));
        let options = BulkIndexingOptions {
            batch_size,
            flush_interval_secs: flush_secs,
            ..Default::default()
        };
        IndexingQueue::start(pipeline, options, 16)
    }

    #[tokio::test]
    async fn test_flushes_when_batch_is_full() {
        let index = Arc::new(InMemoryIndex::new());
        let queue = queue(index.clone(), 2, 3600);

        queue.submit(job("w1")).await.unwrap();
        queue.submit(job("w2")).await.unwrap();

        for _ in 0..100 {
            if queue.status().completed == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let status = queue.status();
        assert_eq!(status.completed, 2);
        assert_eq!(status.pending, 0);
        assert_eq!(index.len(), 2);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_remaining_jobs() {
        let index = Arc::new(InMemoryIndex::new());
        let queue = queue(index.clone(), 100, 3600);

        queue.submit(job("w1")).await.unwrap();
        queue.shutdown().await;

        assert_eq!(index.len(), 1);
        assert_eq!(queue.status().flushes, 1);
        assert!(matches!(
            queue.submit(job("w2")).await,
            Err(IndexingError::QueueClosed)
        ));
    }
}
