//! Process-local result store, used by the monolith and in tests.

use crate::domain::errors::SinkError;
use crate::domain::matches::{MatchId, PlayerId};
use crate::ports::results::ResultSink;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;

/// Everything recorded for one match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchResults {
    pub frames: BTreeMap<PlayerId, Vec<u64>>,
    pub clips: BTreeMap<PlayerId, PathBuf>,
    pub failures: Vec<String>,
}

#[derive(Clone, Default)]
pub struct InMemoryResults {
    matches: Arc<Mutex<HashMap<MatchId, MatchResults>>>,
    changed: Arc<Notify>,
}

impl InMemoryResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, match_id: MatchId) -> Option<MatchResults> {
        let matches = self.matches.lock().unwrap_or_else(PoisonError::into_inner);
        matches.get(&match_id).cloned()
    }

    /// Wait until the results of `match_id` satisfy `ready`, and return them.
    pub async fn wait_until<F>(&self, match_id: MatchId, ready: F) -> MatchResults
    where
        F: Fn(&MatchResults) -> bool,
    {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(results) = self.snapshot(match_id).filter(|results| ready(results)) {
                return results;
            }
            notified.await;
        }
    }

    fn update(&self, match_id: MatchId, apply: impl FnOnce(&mut MatchResults)) {
        {
            let mut matches = self.matches.lock().unwrap_or_else(PoisonError::into_inner);
            apply(matches.entry(match_id).or_default());
        }
        self.changed.notify_waiters();
    }
}

#[async_trait]
impl ResultSink for InMemoryResults {
    async fn upsert_player_frames(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        frames: &[u64],
    ) -> Result<(), SinkError> {
        self.update(match_id, |results| {
            results.frames.insert(player_id, frames.to_vec());
        });
        Ok(())
    }

    async fn record_clip(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        clip: &Path,
    ) -> Result<(), SinkError> {
        self.update(match_id, |results| {
            results.clips.insert(player_id, clip.to_path_buf());
        });
        Ok(())
    }

    async fn notify_failure(&self, match_id: MatchId, reason: &str) -> Result<(), SinkError> {
        self.update(match_id, |results| results.failures.push(reason.to_string()));
        Ok(())
    }
}
