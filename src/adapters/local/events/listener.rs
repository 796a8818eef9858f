use super::hub::EventHub;
use super::MatchEvent;
use crate::domain::errors::CoordinatorError;
use crate::ports::submission::MatchSubmitter;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Forward match events to the coordinator until the hub goes away.
pub fn start(event_hub: Arc<EventHub>, submitter: Arc<dyn MatchSubmitter>) -> JoinHandle<()> {
    let mut rx = event_hub.subscribe();

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => handle(&event, submitter.as_ref()),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "event listener fell behind, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("event listener stopped");
    })
}

fn handle(event: &MatchEvent, submitter: &dyn MatchSubmitter) {
    let game = event.game();
    let trigger = event.trigger();

    match submitter.submit(game, trigger) {
        Ok(handle) => {
            tracing::info!(match_id = game.id, job_id = %handle.job_id, ?trigger, "match submitted");
        }
        Err(CoordinatorError::AlreadyInFlight(match_id)) => {
            tracing::info!(match_id, ?trigger, "match already being analysed");
        }
        Err(e) => {
            tracing::warn!(match_id = game.id, ?trigger, "match not submitted: {}", e);
        }
    }
}
