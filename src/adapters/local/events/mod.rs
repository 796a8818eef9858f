use crate::domain::jobs::Trigger;
use crate::domain::matches::Match;
use serde::{Deserialize, Serialize};

pub mod hub;
pub mod listener;

/// Match lifecycle signals coming from the records application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MatchEvent {
    /// Roster and video link are final.
    Finalized(Match),
    ReanalysisRequested(Match),
}

impl MatchEvent {
    pub fn trigger(&self) -> Trigger {
        match self {
            MatchEvent::Finalized(_) => Trigger::Automatic,
            MatchEvent::ReanalysisRequested(_) => Trigger::UserRequested,
        }
    }

    pub fn game(&self) -> &Match {
        match self {
            MatchEvent::Finalized(game) | MatchEvent::ReanalysisRequested(game) => game,
        }
    }
}
