//! Monolith Binary - Whole pipeline in one process
//!
//! It wires up:
//! - Analysis lane (HTTP client to the analysis service)
//! - Slicing lane (ffmpeg clip writer, video cache)
//! - Coordinator with its lease table
//! - Event hub, listener and the inbound HTTP trigger

use faceoff::adapters::local::http::{self, AppState};
use faceoff::adapters::local::{events, EventHub, FfmpegSlicer, FsTransport, InMemoryResults};
use faceoff::adapters::remote::{AnalysisClient, HttpTransport, RetryPolicy, SchemeTransport};
use faceoff::application::coordinator::{
    AnalysisHandler, Coordinator, CoordinatorSettings, SlicingHandler,
};
use faceoff::application::fetch_cache::VideoCache;
use faceoff::application::worker::WorkerPool;
use faceoff::config::PipelineConfig;
use faceoff::ports::submission::MatchSubmitter;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = PipelineConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 1. Adapters
    let retry = RetryPolicy::default()
        .with_max_attempts(config.analysis_max_attempts)
        .with_base_delay(config.analysis_backoff);
    let lease_ttl = config
        .lease_ttl
        .max(retry.worst_case(config.analysis_timeout));
    let analysis_client = Arc::new(
        AnalysisClient::new(&config.analysis_base_url, config.analysis_timeout, retry)
            .expect("Failed to build analysis client"),
    );
    let transport = SchemeTransport::new(
        HttpTransport::new().expect("Failed to build HTTP transport"),
        FsTransport::new(),
    );
    let slicer = Arc::new(FfmpegSlicer::new(
        config.clip_window_frames,
        config.clip_fallback_fps,
    ));
    let results = InMemoryResults::new();

    match analysis_client.status().await {
        Ok(status) => tracing::info!(
            status = %status.status,
            version = status.version,
            "analysis service is up"
        ),
        Err(e) => tracing::warn!("analysis service not reachable yet: {}", e),
    }

    // 2. Lanes
    let analysis_pool = WorkerPool::new("analysis", AnalysisHandler::new(analysis_client));
    let slicing_pool = WorkerPool::new("slicing", SlicingHandler::new(slicer.clone()));

    // 3. Coordinator
    let coordinator: Arc<dyn MatchSubmitter> = Arc::new(Coordinator::new(
        CoordinatorSettings {
            auth_token: config.analysis_auth_token.clone(),
            clips_dir: config.clips_dir.clone(),
            lease_ttl: Some(lease_ttl),
        },
        VideoCache::new(&config.video_cache_dir, transport),
        slicer,
        Arc::new(results.clone()),
        analysis_pool.lane(),
        slicing_pool.lane(),
    ));

    // 4. Start Workers
    analysis_pool.start(config.analysis_workers);
    slicing_pool.start(config.slicing_workers);

    // 5. Event System
    let event_hub = Arc::new(EventHub::new(config.event_capacity));
    events::listener::start(event_hub.clone(), coordinator.clone());

    // 6. HTTP Layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = http::router(AppState {
        event_hub: event_hub.clone(),
        submitter: coordinator,
        results,
    })
    .layer(cors);

    // 7. Start Server
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.addr, config.port))
        .await
        .expect("Failed to bind TCP listener");
    tracing::info!("Listening at {}:{}", config.addr, config.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server failed to start");

    analysis_pool.shutdown().await;
    slicing_pool.shutdown().await;
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("shutting down");
}
