//! Session player data structures and the engine's per-round pool view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a player (used in assignments and pair history).
pub type PlayerId = Uuid;

/// Player gender. Players may leave it unset; unset acts as a wildcard for
/// grouping (never counted toward a mixed court's 2M+2F shape).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

/// Where a player currently stands within a session.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    /// In the pool, eligible for the next round.
    #[default]
    Available,
    /// On a court in the active round.
    Playing,
    /// Sitting out the rest phase.
    Resting,
    /// Slotted into an upcoming round by a manual swap.
    Selected,
    /// Left or was removed; finishes the current game if mid-round but is
    /// never pooled again.
    Removed,
}

/// A player within one session's pool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionPlayer {
    pub id: PlayerId,
    pub name: String,
    pub gender: Option<Gender>,
    /// Skill level, 1 (beginner) to 5 (strongest).
    pub level: u8,
    pub status: PlayerStatus,
    /// Games played within this session.
    pub play_count: u32,
    pub last_played_at: Option<DateTime<Utc>>,
}

impl SessionPlayer {
    /// Create a new pool entry. Level is clamped to the 1-5 range.
    pub fn new(name: impl Into<String>, gender: Option<Gender>, level: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            gender,
            level: level.clamp(crate::models::LEVEL_MIN, crate::models::LEVEL_MAX),
            status: PlayerStatus::Available,
            play_count: 0,
            last_played_at: None,
        }
    }

    /// Record one played game: playing status, +1 count, fresh timestamp.
    pub fn record_game(&mut self, now: DateTime<Utc>) {
        self.play_count += 1;
        self.last_played_at = Some(now);
        self.status = PlayerStatus::Playing;
    }

    /// Whether this player may be considered by the selection engine.
    pub fn is_poolable(&self) -> bool {
        matches!(
            self.status,
            PlayerStatus::Available | PlayerStatus::Playing | PlayerStatus::Resting
        )
    }

    /// The engine's view of this player for one selection run.
    pub fn pool_view(&self) -> PoolPlayer {
        PoolPlayer {
            id: self.id,
            gender: self.gender,
            level: self.level,
            games_played: self.play_count,
            on_court: self.status == PlayerStatus::Playing,
        }
    }
}

/// Snapshot of a player handed to the selection engine. The engine never
/// mutates player state; all bookkeeping happens in the store afterwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoolPlayer {
    pub id: PlayerId,
    pub gender: Option<Gender>,
    pub level: u8,
    pub games_played: u32,
    /// Currently mid-game; such players carry a virtual extra game so a
    /// concurrent selection deprioritizes them.
    pub on_court: bool,
}

impl PoolPlayer {
    /// Games played plus the virtual +1 while on court.
    pub fn effective_games(&self) -> u32 {
        self.games_played + u32::from(self.on_court)
    }
}
