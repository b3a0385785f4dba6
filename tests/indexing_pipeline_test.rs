use archive_search::enrichment::DocumentEnhancer;
use archive_search::indexing::{IndexingError, IndexingPipeline, IndexingQueue};
use archive_search::models::{
    BulkIndexingOptions, IndexingJob, JobStatus, RefreshPolicy, WorkIndexDocument,
};
use archive_search::search::InMemoryIndex;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn work(id: &str, title: &str) -> WorkIndexDocument {
    let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let mut doc = WorkIndexDocument::new(id, title, at);
    doc.fandoms = vec!["Good Omens".to_string()];
    doc.rating = "general".to_string();
    doc
}

fn setup() -> (Arc<InMemoryIndex>, IndexingPipeline) {
    let index = Arc::new(InMemoryIndex::new());
    let pipeline = IndexingPipeline::new(index.clone(), DocumentEnhancer::default());
    (index, pipeline)
}

fn options(batch_size: usize, enable_retries: bool) -> BulkIndexingOptions {
    BulkIndexingOptions {
        batch_size,
        max_concurrency: 2,
        enable_retries,
        retry_delay_ms: 1,
        refresh_policy: RefreshPolicy::WaitFor,
        ..Default::default()
    }
}

fn create_jobs(ids: &[&str]) -> Vec<IndexingJob> {
    ids.iter()
        .map(|id| IndexingJob::create(work(id, &format!("Work {}", id))))
        .collect()
}

#[tokio::test]
async fn test_failed_batch_is_never_reported_successful() {
    let (index, pipeline) = setup();
    index.fail_next_bulks(1);

    let result = pipeline
        .index_bulk(
            create_jobs(&["w1", "w2", "w3"]),
            &options(10, false),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.total_jobs, 3);
    assert_eq!(result.successful, 0);
    assert_eq!(result.failed, 3);
    assert_eq!(result.successful + result.failed, result.total_jobs);
    for outcome in &result.outcomes {
        assert_eq!(outcome.status, JobStatus::Failed);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.error.as_deref().unwrap().contains("connection reset"));
        assert_eq!(outcome.version, None);
    }
    assert!(index.is_empty());
    assert_eq!(pipeline.failed_total(), 3);
}

#[tokio::test]
async fn test_failed_batch_is_retried() {
    let (index, pipeline) = setup();
    index.fail_next_bulks(1);

    let result = pipeline
        .index_bulk(
            create_jobs(&["w1", "w2", "w3"]),
            &options(10, true),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.successful, 3);
    assert_eq!(result.failed, 0);
    for outcome in &result.outcomes {
        assert_eq!(outcome.status, JobStatus::Completed);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.error, None);
    }
    assert_eq!(index.bulk_calls(), 2);
    assert_eq!(index.len(), 3);
    assert_eq!(index.refresh_log(), vec![RefreshPolicy::WaitFor]);
}

#[tokio::test]
async fn test_only_the_failed_batch_fails() {
    let (index, pipeline) = setup();
    index.fail_next_bulks(1);

    // one batch at a time so the injected failure hits the first batch
    let mut opts = options(2, false);
    opts.max_concurrency = 1;
    let result = pipeline
        .index_bulk(
            create_jobs(&["w1", "w2", "w3", "w4", "w5"]),
            &opts,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.total_jobs, 5);
    assert_eq!(result.successful, 3);
    assert_eq!(result.failed, 2);
    let failed: Vec<&str> = result
        .outcomes
        .iter()
        .filter(|o| !o.is_success())
        .map(|o| o.work_id.as_str())
        .collect();
    assert_eq!(failed, vec!["w1", "w2"]);
}

#[tokio::test]
async fn test_rejected_work_fails_individually() {
    let (index, pipeline) = setup();
    index.reject_work("w2");

    let jobs: Vec<IndexingJob> = create_jobs(&["w1", "w2", "w3"])
        .into_iter()
        .map(|job| job.with_max_retries(1))
        .collect();
    let result = pipeline
        .index_bulk(jobs, &options(10, true), &CancellationToken::new())
        .await;

    assert_eq!(result.successful, 2);
    assert_eq!(result.failed, 1);
    let rejected = &result.outcomes[1];
    assert_eq!(rejected.work_id, "w2");
    assert_eq!(rejected.status, JobStatus::Failed);
    assert_eq!(rejected.attempts, 2);
    assert!(rejected.error.as_deref().unwrap().contains("rejected"));
    assert!(index.document("w2").is_none());
}

#[tokio::test]
async fn test_cancelled_run_submits_nothing() {
    let (index, pipeline) = setup();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = pipeline
        .index_bulk(create_jobs(&["w1", "w2"]), &options(1, true), &cancel)
        .await;

    assert!(result.cancelled);
    assert_eq!(result.successful, 0);
    assert_eq!(result.failed, 2);
    assert!(result
        .outcomes
        .iter()
        .all(|o| o.error.as_deref() == Some("cancelled")));
    assert_eq!(index.bulk_calls(), 0);
}

#[tokio::test]
async fn test_cancel_during_run_stops_later_batches() {
    let (index, pipeline) = setup();
    index.set_bulk_delay(Duration::from_millis(50));
    let cancel = CancellationToken::new();

    let mut opts = options(1, false);
    opts.max_concurrency = 1;

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let result = pipeline
        .index_bulk(create_jobs(&["w1", "w2", "w3", "w4"]), &opts, &cancel)
        .await;

    assert!(result.cancelled);
    assert_eq!(result.successful + result.failed, 4);
    assert!(result.successful < 4);
    assert!(index.bulk_calls() < 4);
}

#[tokio::test]
async fn test_reindex_bumps_version() {
    let (index, pipeline) = setup();
    let cancel = CancellationToken::new();

    let first = pipeline
        .index_bulk(
            vec![IndexingJob::create(work("w1", "First Draft"))],
            &options(10, true),
            &cancel,
        )
        .await;
    let second = pipeline
        .index_bulk(
            vec![IndexingJob::update(work("w1", "Final Draft"))],
            &options(10, true),
            &cancel,
        )
        .await;

    let v1 = first.outcomes[0].version.unwrap();
    let v2 = second.outcomes[0].version.unwrap();
    assert!(v2 > v1);

    let stored = index.document("w1").unwrap();
    assert_eq!(stored.title, "Final Draft");
    assert_eq!(stored.version, v2);
}

#[tokio::test]
async fn test_mixed_jobs_with_missing_delete() {
    let (index, pipeline) = setup();
    let mut jobs = create_jobs(&["w1"]);
    jobs.push(IndexingJob::delete("never-indexed"));
    let mut mismatched = IndexingJob::create(work("w2", "Other"));
    mismatched.work_id = "w3".to_string();
    jobs.push(mismatched);

    let result = pipeline
        .index_bulk(jobs, &options(10, true), &CancellationToken::new())
        .await;

    assert_eq!(result.total_jobs, 3);
    assert!(result.outcomes[0].is_success());
    assert!(result.outcomes[1].is_success());
    assert!(!result.outcomes[2].is_success());
    assert!(result.outcomes[2]
        .error
        .as_deref()
        .unwrap()
        .contains("does not match"));
    assert_eq!(index.len(), 1);
}

#[tokio::test]
async fn test_index_one_then_delete() {
    let (index, pipeline) = setup();

    let written = pipeline.index_one(work("w1", "Alone")).await.unwrap();
    assert!(written.tagging_quality_score > 0.0);
    assert_eq!(index.document("w1").unwrap().version, written.version);

    pipeline.delete("w1").await.unwrap();
    assert!(index.is_empty());
    assert!(matches!(
        pipeline.delete("  ").await,
        Err(IndexingError::Validation(_))
    ));
}

#[tokio::test]
async fn test_queue_flushes_on_interval() {
    let (index, pipeline) = setup();
    let opts = BulkIndexingOptions {
        batch_size: 100,
        flush_interval_secs: 1,
        ..Default::default()
    };
    let queue = IndexingQueue::start(Arc::new(pipeline), opts, 8);

    queue
        .submit(IndexingJob::create(work("w1", "Queued")))
        .await
        .unwrap();
    assert_eq!(queue.status().pending, 1);

    for _ in 0..60 {
        if queue.status().completed == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let status = queue.status();
    assert_eq!(status.completed, 1);
    assert_eq!(status.pending, 0);
    assert!(status.last_flush_at.is_some());
    assert_eq!(status.error_rate, 0.0);
    assert!(index.document("w1").is_some());
    queue.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_jobs_accepted_during_shutdown_are_indexed() {
    let (index, pipeline) = setup();
    let opts = BulkIndexingOptions {
        batch_size: 100,
        flush_interval_secs: 3600,
        ..Default::default()
    };
    let queue = Arc::new(IndexingQueue::start(Arc::new(pipeline), opts, 4));

    let mut submitters = Vec::new();
    for i in 0..40 {
        let queue = queue.clone();
        submitters.push(tokio::spawn(async move {
            let id = format!("w{}", i);
            queue
                .submit(IndexingJob::create(work(&id, "Racing")))
                .await
                .map(|_| id)
        }));
    }
    tokio::time::sleep(Duration::from_millis(1)).await;
    queue.shutdown().await;

    let mut accepted = Vec::new();
    for submitter in submitters {
        match submitter.await.unwrap() {
            Ok(id) => accepted.push(id),
            Err(e) => assert!(matches!(e, IndexingError::QueueClosed)),
        }
    }

    assert_eq!(index.len(), accepted.len());
    for id in &accepted {
        assert!(index.document(id).is_some(), "{} was accepted but not indexed", id);
    }
    let status = queue.status();
    assert_eq!(status.pending, 0);
    assert_eq!(status.completed, accepted.len() as u64);
}
