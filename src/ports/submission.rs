use crate::domain::errors::CoordinatorError;
use crate::domain::jobs::{AnalysisOutcome, Priority, Trigger};
use crate::domain::matches::{Match, MatchId};
use tokio::sync::oneshot;

/// Receipt for an accepted submission.
#[derive(Debug)]
pub struct JobHandle {
    pub job_id: String,
    pub match_id: MatchId,
    pub priority: Priority,
    outcome: oneshot::Receiver<AnalysisOutcome>,
}

impl JobHandle {
    pub fn new(
        job_id: String,
        match_id: MatchId,
        priority: Priority,
        outcome: oneshot::Receiver<AnalysisOutcome>,
    ) -> Self {
        Self {
            job_id,
            match_id,
            priority,
            outcome,
        }
    }

    /// Wait until the analysis has been ingested or has failed.
    ///
    /// Returns `None` if the pipeline was torn down before reporting back.
    pub async fn outcome(self) -> Option<AnalysisOutcome> {
        self.outcome.await.ok()
    }
}

/// Inbound side of the pipeline, as seen by the HTTP layer and event listener.
#[cfg_attr(test, mockall::automock)]
pub trait MatchSubmitter: Send + Sync {
    fn submit(&self, game: &Match, trigger: Trigger) -> Result<JobHandle, CoordinatorError>;

    /// Drop the in-flight marker of a match. Returns whether one was held.
    fn release_lease(&self, match_id: MatchId) -> bool;
}
