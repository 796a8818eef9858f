//! Match roster as handed over by the records-management application.

use super::errors::CoordinatorError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub type MatchId = u64;
pub type TeamId = u64;
pub type PlayerId = u64;

pub const MIN_JERSEY_NUMBER: u32 = 0;
pub const MAX_JERSEY_NUMBER: u32 = 99;
pub const MAX_TEAMS_PER_MATCH: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub team_id: TeamId,
    pub number: u32,
}

/// A single game and everyone who took part in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    /// Link to the full-length recording.
    #[serde(default)]
    pub video_link: Option<String>,
    pub team_ids: Vec<TeamId>,
    pub players: Vec<Player>,
}

/// Jersey numbers of one team, in roster order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamRoster {
    pub team_id: TeamId,
    pub numbers: Vec<u32>,
}

impl Match {
    /// Check the match can be sent for analysis and return its video link.
    pub fn validate(&self) -> Result<&str, CoordinatorError> {
        let link = self
            .video_link
            .as_deref()
            .map(str::trim)
            .filter(|link| !link.is_empty())
            .ok_or_else(|| CoordinatorError::invalid(self.id, "video link is missing"))?;

        if self.players.is_empty() {
            return Err(CoordinatorError::invalid(self.id, "player roster is empty"));
        }
        if self.team_ids.is_empty() {
            return Err(CoordinatorError::invalid(self.id, "no teams listed"));
        }
        if self.team_ids.len() > MAX_TEAMS_PER_MATCH {
            return Err(CoordinatorError::invalid(
                self.id,
                format!("at most {} teams may take part", MAX_TEAMS_PER_MATCH),
            ));
        }

        let teams: HashSet<TeamId> = self.team_ids.iter().copied().collect();
        if teams.len() != self.team_ids.len() {
            return Err(CoordinatorError::invalid(
                self.id,
                "a team cannot play against itself",
            ));
        }

        let mut seen = HashSet::new();
        for player in &self.players {
            if !(MIN_JERSEY_NUMBER..=MAX_JERSEY_NUMBER).contains(&player.number) {
                return Err(CoordinatorError::invalid(
                    self.id,
                    format!(
                        "player {} has jersey number {} outside {}..={}",
                        player.id, player.number, MIN_JERSEY_NUMBER, MAX_JERSEY_NUMBER
                    ),
                ));
            }
            if !teams.contains(&player.team_id) {
                return Err(CoordinatorError::invalid(
                    self.id,
                    format!(
                        "player {} belongs to team {} which is not in this match",
                        player.id, player.team_id
                    ),
                ));
            }
            if !seen.insert((player.team_id, player.number)) {
                return Err(CoordinatorError::invalid(
                    self.id,
                    format!(
                        "jersey number {} is used twice in team {}",
                        player.number, player.team_id
                    ),
                ));
            }
        }

        Ok(link)
    }

    /// Jersey numbers grouped per team, following `team_ids` order.
    pub fn rosters(&self) -> Vec<TeamRoster> {
        self.team_ids
            .iter()
            .map(|&team_id| TeamRoster {
                team_id,
                numbers: self
                    .players
                    .iter()
                    .filter(|player| player.team_id == team_id)
                    .map(|player| player.number)
                    .collect(),
            })
            .collect()
    }

    pub fn player_for(&self, team_id: TeamId, number: u32) -> Option<PlayerId> {
        self.players
            .iter()
            .find(|player| player.team_id == team_id && player.number == number)
            .map(|player| player.id)
    }
}
