//! Inbound HTTP trigger.
//!
//! The records application posts finalized matches here; each request is
//! turned into a `MatchEvent` on the hub and picked up by the listener.

use super::events::hub::EventHub;
use super::events::MatchEvent;
use super::memory::{InMemoryResults, MatchResults};
use crate::domain::matches::{Match, MatchId};
use crate::ports::submission::MatchSubmitter;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub event_hub: Arc<EventHub>,
    pub submitter: Arc<dyn MatchSubmitter>,
    pub results: InMemoryResults,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/matches", post(finalized))
        .route("/matches/reanalyze", post(reanalyze))
        .route("/matches/:id/lease", delete(release_lease))
        .route("/matches/:id/results", get(results))
        .with_state(state)
}

async fn finalized(
    State(state): State<AppState>,
    Json(game): Json<Match>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, String)> {
    publish(&state, MatchEvent::Finalized(game))
}

async fn reanalyze(
    State(state): State<AppState>,
    Json(game): Json<Match>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, String)> {
    publish(&state, MatchEvent::ReanalysisRequested(game))
}

fn publish(
    state: &AppState,
    event: MatchEvent,
) -> Result<(StatusCode, Json<Value>), (StatusCode, String)> {
    let match_id = event.game().id;
    event
        .game()
        .validate()
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    if let Err(e) = state.event_hub.publish(event) {
        tracing::error!(match_id, "no listener for match events: {}", e);
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "match events are not being processed".to_string(),
        ));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "match_id": match_id, "status": "accepted" })),
    ))
}

async fn release_lease(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
) -> (StatusCode, Json<Value>) {
    let released = state.submitter.release_lease(match_id);
    (
        StatusCode::ACCEPTED,
        Json(json!({ "match_id": match_id, "released": released })),
    )
}

async fn results(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
) -> Result<Json<MatchResults>, (StatusCode, String)> {
    state.results.snapshot(match_id).map(Json).ok_or((
        StatusCode::NOT_FOUND,
        format!("no results for match {}", match_id),
    ))
}
