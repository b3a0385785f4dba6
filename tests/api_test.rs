use archive_search::api::{build_router, AppState};
use archive_search::enrichment::DocumentEnhancer;
use archive_search::indexing::{IndexingPipeline, IndexingQueue};
use archive_search::models::BulkIndexingOptions;
use archive_search::search::{InMemoryIndex, SearchConfig, SearchService};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

struct TestServer {
    base: String,
    index: Arc<InMemoryIndex>,
    client: reqwest::Client,
}

async fn spawn_server() -> TestServer {
    let index = Arc::new(InMemoryIndex::new());
    let search = Arc::new(SearchService::new(index.clone(), SearchConfig::default()));
    let pipeline = Arc::new(IndexingPipeline::new(
        index.clone(),
        DocumentEnhancer::default(),
    ));
    let options = BulkIndexingOptions {
        batch_size: 1,
        retry_delay_ms: 1,
        ..Default::default()
    };
    let queue = Arc::new(IndexingQueue::start(pipeline.clone(), options.clone(), 8));
    let app = build_router(AppState::new(search, pipeline, queue).with_bulk_defaults(options));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base: format!("http://{}", addr),
        index,
        client: reqwest::Client::new(),
    }
}

fn work_body(id: &str, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "summary": "A dragon learns to read.",
        "fandoms": ["Temeraire"],
        "characters": ["Temeraire"],
        "relationships": ["Temeraire & Will Laurence"],
        "rating": "general",
        "published_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-05T00:00:00Z",
        "kudos": 10
    })
}

#[tokio::test]
async fn test_health_and_metrics() {
    let server = spawn_server().await;

    let health: Value = server
        .client
        .get(format!("{}/health", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");

    let metrics = server
        .client
        .get(format!("{}/metrics", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(metrics.status(), 200);
}

#[tokio::test]
async fn test_index_search_delete_round() {
    let server = spawn_server().await;

    let response = server
        .client
        .put(format!("{}/v1/works/w1", server.base))
        .json(&work_body("w1", "Dragon Letters"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let written: Value = response.json().await.unwrap();
    assert_eq!(written["work_id"], "w1");
    assert_eq!(written["version"], 1);
    assert!(written["tagging_quality_score"].as_f64().unwrap() > 0.0);

    let results: Value = server
        .client
        .post(format!("{}/v1/search", server.base))
        .json(&json!({ "query": "dragon", "include_facets": true }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(results["total"], 1);
    assert_eq!(results["results"][0]["work_id"], "w1");
    assert_eq!(results["facets"]["fandoms"][0]["value"], "Temeraire");

    let deleted: Value = server
        .client
        .delete(format!("{}/v1/works/w1", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(deleted["outcome"], "deleted");
    assert!(server.index.is_empty());

    let again: Value = server
        .client
        .delete(format!("{}/v1/works/w1", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(again["outcome"], "not_found");
}

#[tokio::test]
async fn test_invalid_requests_are_bad_request() {
    let server = spawn_server().await;

    let search = server
        .client
        .post(format!("{}/v1/search", server.base))
        .json(&json!({ "limit": 1000 }))
        .send()
        .await
        .unwrap();
    assert_eq!(search.status(), 400);
    let body: Value = search.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let mismatched = server
        .client
        .put(format!("{}/v1/works/w2", server.base))
        .json(&work_body("w1", "Wrong Id"))
        .send()
        .await
        .unwrap();
    assert_eq!(mismatched.status(), 400);

    let empty_bulk = server
        .client
        .post(format!("{}/v1/works/bulk", server.base))
        .json(&json!({ "jobs": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(empty_bulk.status(), 400);
    assert!(server.index.is_empty());
}

#[tokio::test]
async fn test_bulk_reports_every_job() {
    let server = spawn_server().await;

    let mut doc = work_body("w1", "Bulk One");
    doc["work_id"] = json!("w1");
    let result: Value = server
        .client
        .post(format!("{}/v1/works/bulk", server.base))
        .json(&json!({
            "jobs": [
                { "type": "create", "work_id": "w1", "document": doc },
                { "type": "delete", "work_id": "missing" },
                { "type": "update", "work_id": "w3" }
            ]
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(result["total_jobs"], 3);
    assert_eq!(result["successful"], 2);
    assert_eq!(result["failed"], 1);
    assert_eq!(result["outcomes"][2]["status"], "failed");
    assert!(server.index.document("w1").is_some());
}

#[tokio::test]
async fn test_analyze_and_background_jobs() {
    let server = spawn_server().await;

    let mut record = work_body("w5", "Missing Reader");
    record["relationships"] = json!(["Temeraire/Reader"]);
    let analysis: Value = server
        .client
        .post(format!("{}/v1/works/analyze", server.base))
        .json(&record)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(analysis["work_id"], "w5");
    assert_eq!(analysis["enhancement"]["missing_characters"][0], "Reader");
    assert!(server.index.is_empty());

    let accepted = server
        .client
        .post(format!("{}/v1/indexing/jobs", server.base))
        .json(&json!({ "type": "delete", "work_id": "w9" }))
        .send()
        .await;
    let accepted = assert_ok!(accepted);
    assert_eq!(accepted.status(), 202);

    let mut status = Value::Null;
    for _ in 0..100 {
        status = server
            .client
            .get(format!("{}/v1/indexing/status", server.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if status["completed"] == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(status["completed"], 1);
    assert_eq!(status["failed"], 0);

    let malformed = server
        .client
        .post(format!("{}/v1/indexing/jobs", server.base))
        .header("content-type", "application/json")
        .body("{\"work_id\": 5")
        .send()
        .await
        .unwrap();
    assert_err!(malformed.error_for_status());
}

#[tokio::test]
async fn test_timed_out_bulk_request_cancels_remaining_batches() {
    let index = Arc::new(InMemoryIndex::new());
    index.set_bulk_delay(Duration::from_millis(80));
    let search = Arc::new(SearchService::new(index.clone(), SearchConfig::default()));
    let pipeline = Arc::new(IndexingPipeline::new(
        index.clone(),
        DocumentEnhancer::default(),
    ));
    let options = BulkIndexingOptions {
        batch_size: 1,
        max_concurrency: 1,
        ..Default::default()
    };
    let queue = Arc::new(IndexingQueue::start(pipeline.clone(), options.clone(), 8));
    let app = build_router(
        AppState::new(search, pipeline.clone(), queue)
            .with_bulk_defaults(options)
            .with_request_timeout(Duration::from_millis(100)),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let jobs: Vec<Value> = (1..=4)
        .map(|i| {
            let id = format!("w{}", i);
            json!({ "type": "create", "work_id": id.clone(), "document": work_body(&id, "Slow Bulk") })
        })
        .collect();
    let response = reqwest::Client::new()
        .post(format!("http://{}/v1/works/bulk", addr))
        .json(&json!({ "jobs": jobs }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 408);

    for _ in 0..100 {
        if pipeline.completed_total() + pipeline.failed_total() == 4 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    // every job is accounted for, and the batches after the timeout never ran
    assert_eq!(pipeline.completed_total() + pipeline.failed_total(), 4);
    assert!(pipeline.failed_total() >= 1);
    assert!(index.len() < 4);
    assert_eq!(index.len() as u64, pipeline.completed_total());
}
