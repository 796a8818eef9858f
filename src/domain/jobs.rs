use super::analysis::AnalysisRequest;
use super::matches::{MatchId, PlayerId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Two lanes per queue: urgent work drains before normal work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Low,
}

/// What caused a match to be submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    /// Match record was saved with a final roster and video.
    Automatic,
    /// A user explicitly asked for the match to be analysed again.
    UserRequested,
}

impl Trigger {
    pub fn priority(self) -> Priority {
        match self {
            Trigger::Automatic => Priority::Low,
            Trigger::UserRequested => Priority::High,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub match_id: MatchId,
    pub request: AnalysisRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipJob {
    pub match_id: MatchId,
    pub player_id: PlayerId,
    /// Cached copy of the full match video.
    pub source_path: PathBuf,
    pub frames: Vec<u64>,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClipOutcome {
    Completed(PathBuf),
    Failed(String),
}

/// What became of one submitted analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisOutcome {
    /// Frame records were stored and `clip_jobs` clips were queued.
    Dispatched { clip_jobs: usize },
    Failed { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_priority() {
        assert_eq!(Trigger::Automatic.priority(), Priority::Low);
        assert_eq!(Trigger::UserRequested.priority(), Priority::High);
    }
}
