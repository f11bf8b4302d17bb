//! Court assignments: one row per (round, court, player), plus the engine's
//! in-memory grouping type.

use crate::models::court::CourtId;
use crate::models::player::{PlayerId, PoolPlayer};
use crate::models::session::SessionId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an assignment row.
pub type AssignmentId = Uuid;

/// Kind of game a court hosts this round.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    /// Two males and two females, opposite-gender pairs on each side.
    Mixed,
    /// Same-gender four (or any four when strict gender is off).
    Doubles,
}

impl GameType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::Mixed => "mixed",
            GameType::Doubles => "doubles",
        }
    }
}

/// Lifecycle of an assignment row.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    /// Part of the round currently being played.
    Active,
    /// Pre-selected next round, shown ahead of time.
    Upcoming,
    /// A past round, kept for history.
    Finished,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Active => "active",
            AssignmentStatus::Upcoming => "upcoming",
            AssignmentStatus::Finished => "finished",
        }
    }
}

/// Which side of the net a player was placed on.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamSide {
    A,
    B,
}

/// One player's placement for one round, as persisted by the store.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRow {
    pub id: AssignmentId,
    pub session_id: SessionId,
    pub court_id: CourtId,
    pub player_id: PlayerId,
    pub round: u32,
    pub status: AssignmentStatus,
    pub game_type: GameType,
    pub side: TeamSide,
}

impl AssignmentRow {
    pub fn new(
        session_id: SessionId,
        court_id: CourtId,
        player_id: PlayerId,
        round: u32,
        status: AssignmentStatus,
        game_type: GameType,
        side: TeamSide,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            court_id,
            player_id,
            round,
            status,
            game_type,
            side,
        }
    }
}

/// One court's grouping as produced by the selection engine: two teams of
/// two, tagged with the game type the court resolved to.
#[derive(Clone, Debug, PartialEq)]
pub struct CourtGroup {
    /// Index into the round's unlocked-court list.
    pub court_index: usize,
    pub game_type: GameType,
    pub team_a: [PoolPlayer; 2],
    pub team_b: [PoolPlayer; 2],
}

impl CourtGroup {
    /// All four players, team A first.
    pub fn players(&self) -> impl Iterator<Item = &PoolPlayer> {
        self.team_a.iter().chain(self.team_b.iter())
    }
}
