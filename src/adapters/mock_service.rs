//! Stand-in for the external analysis backend, for local runs.
//!
//! Answers `/process` after a configurable delay with random, sorted frame
//! indices for every requested jersey number.

use crate::config::MockServiceConfig;
use crate::domain::analysis::{AnalysisRequest, CleanReport, PlayerDetection, ServiceStatus};
use axum::{
    extract::State,
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use rand::Rng;
use serde_json::{json, Value};
use std::sync::Arc;

const SERVICE_VERSION: f64 = 1.0;

pub fn router(config: MockServiceConfig) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/status", get(status))
        .route("/version", get(version))
        .route("/process", post(process))
        .route("/clean", post(clean))
        .with_state(Arc::new(config))
}

async fn root() -> Html<&'static str> {
    Html("<html><body><h1>Match Video Analysis</h1></body></html>")
}

async fn status() -> Json<ServiceStatus> {
    Json(ServiceStatus {
        status: "OK".to_string(),
        version: SERVICE_VERSION,
    })
}

async fn version() -> Json<Value> {
    Json(json!({ "version": SERVICE_VERSION }))
}

async fn process(
    State(config): State<Arc<MockServiceConfig>>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<Vec<PlayerDetection>>, (StatusCode, String)> {
    if request.team_ids.len() != request.player_numbers.len() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "team_ids and player_numbers must have the same length".to_string(),
        ));
    }

    tracing::info!(match_id = request.match_id, delay = ?config.delay, "mock analysis started");
    tokio::time::sleep(config.delay).await;

    let detections = detections_for(&request, &config);
    tracing::info!(
        match_id = request.match_id,
        players = detections.len(),
        "mock analysis finished"
    );
    Ok(Json(detections))
}

async fn clean() -> Json<CleanReport> {
    Json(CleanReport {
        removed: "OK".to_string(),
        objects: 0,
        size: "0 Mb".to_string(),
    })
}

fn detections_for(request: &AnalysisRequest, config: &MockServiceConfig) -> Vec<PlayerDetection> {
    let mut rng = rand::rng();
    let (low, high) = if config.min_frame <= config.max_frame {
        (config.min_frame, config.max_frame)
    } else {
        (config.max_frame, config.min_frame)
    };

    request
        .team_ids
        .iter()
        .zip(&request.player_numbers)
        .flat_map(|(&team, numbers)| numbers.iter().map(move |&number| (team, number)))
        .map(|(team, number)| {
            let mut frames: Vec<u64> = (0..config.frames_per_player)
                .map(|_| rng.random_range(low..=high))
                .collect();
            frames.sort_unstable();
            PlayerDetection {
                number,
                team,
                frames,
            }
        })
        .collect()
}
