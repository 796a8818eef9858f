//! Wire contract of the external video-analysis service.

use super::errors::ClientError;
use super::matches::{Match, MatchId, PlayerId, TeamId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Body of `POST /process`. Built fresh for every submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub match_id: MatchId,
    pub video_link: String,
    pub auth_token: String,
    pub team_ids: Vec<TeamId>,
    /// One list of jersey numbers per entry of `team_ids`.
    pub player_numbers: Vec<Vec<u32>>,
}

impl AnalysisRequest {
    pub fn build(game: &Match, video_link: &str, auth_token: &str) -> Self {
        let rosters = game.rosters();
        Self {
            match_id: game.id,
            video_link: video_link.to_string(),
            auth_token: auth_token.to_string(),
            team_ids: rosters.iter().map(|roster| roster.team_id).collect(),
            player_numbers: rosters.into_iter().map(|roster| roster.numbers).collect(),
        }
    }
}

/// One detected player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerDetection {
    pub number: u32,
    pub team: TeamId,
    /// Frame indices where the player appears, ascending.
    pub frames: Vec<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisResult {
    pub detections: Vec<PlayerDetection>,
}

impl AnalysisResult {
    /// Parse and validate a `/process` response body.
    pub fn parse(raw: &str) -> Result<Self, ClientError> {
        let detections: Vec<PlayerDetection> = serde_json::from_str(raw)
            .map_err(|e| ClientError::malformed(e.to_string(), raw))?;

        let mut seen = HashSet::new();
        for detection in &detections {
            if !seen.insert((detection.team, detection.number)) {
                return Err(ClientError::malformed(
                    format!(
                        "player {} of team {} is listed twice",
                        detection.number, detection.team
                    ),
                    raw,
                ));
            }
            if detection.frames.windows(2).any(|pair| pair[0] > pair[1]) {
                return Err(ClientError::malformed(
                    format!(
                        "frames of player {} of team {} are not ascending",
                        detection.number, detection.team
                    ),
                    raw,
                ));
            }
        }

        Ok(Self { detections })
    }
}

/// Durable frame list of one player in one match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerFrameRecord {
    pub match_id: MatchId,
    pub player_id: PlayerId,
    pub frames: Vec<u64>,
}

/// Answer of `GET /status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
    pub version: f64,
}

/// Answer of `POST /clean`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanReport {
    #[serde(rename = "Removed")]
    pub removed: String,
    #[serde(rename = "Objects")]
    pub objects: u64,
    #[serde(rename = "Size")]
    pub size: String,
}
