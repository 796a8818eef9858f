use crate::domain::errors::SinkError;
use crate::domain::matches::{MatchId, PlayerId};
use async_trait::async_trait;
use std::path::Path;

/// Where analysis outcomes end up: the records-management side of the system.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Replace the stored frame list of a player.
    async fn upsert_player_frames(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        frames: &[u64],
    ) -> Result<(), SinkError>;

    async fn record_clip(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        clip: &Path,
    ) -> Result<(), SinkError>;

    /// Tell whoever submitted the match that it could not be processed.
    async fn notify_failure(&self, match_id: MatchId, reason: &str) -> Result<(), SinkError>;
}
