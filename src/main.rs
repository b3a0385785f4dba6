use archive_search::{
    api::{build_router, AppState},
    config::Config,
    enrichment::DocumentEnhancer,
    indexing::{IndexingPipeline, IndexingQueue},
    search::{HttpIndexClient, IndexClient, SearchService},
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });

    // Initialize tracing
    let json_logs = config.observability.json_logs;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "archive_search={},tower_http=info",
                    config.observability.log_level
                )
                .into()
            }),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    tracing::info!("Starting archive-search v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = archive_search::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    // Index client
    let client: Arc<dyn IndexClient> = Arc::new(HttpIndexClient::new(&config.index)?);
    tracing::info!(
        endpoint = %config.index.endpoint,
        index = %config.index.index_name,
        "Index client initialized"
    );

    // Search service; no datastore is attached, so index failures are surfaced
    let search = Arc::new(SearchService::new(client.clone(), config.index.clone()));

    // Indexing pipeline and background queue
    let pipeline = Arc::new(
        IndexingPipeline::new(client, DocumentEnhancer::new(config.scoring.clone()))
            .with_timeouts(config.index.write_timeout(), config.index.bulk_timeout()),
    );
    let queue = Arc::new(IndexingQueue::start(
        pipeline.clone(),
        config.indexing.bulk.clone(),
        config.indexing.queue_capacity,
    ));

    let app_state = AppState::new(search, pipeline, queue.clone())
        .with_bulk_defaults(config.indexing.bulk.clone())
        .with_request_timeout(Duration::from_secs(config.server.request_timeout_secs));
    let app = build_router(app_state);

    // Start HTTP server
    let http_addr = config.server.bind_address();
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;

    tracing::info!("HTTP API server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   Search API: http://{}/v1/search", http_addr);

    axum::serve(http_listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    tracing::info!("Shutting down gracefully...");
    queue.shutdown().await;
    Ok(())
}
