//! Mock analysis service - Stand-in backend for local runs

use faceoff::adapters::mock_service;
use faceoff::config::MockServiceConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = MockServiceConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let bind = format!("{}:{}", config.addr, config.port);
    let app = mock_service::router(config);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .expect("Failed to bind TCP listener");
    tracing::info!("Mock analysis service listening at {}", bind);
    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}
