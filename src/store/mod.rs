//! Store interface: the collaborator surface the phase driver reads and
//! writes. The driver never touches storage directly; everything goes
//! through this trait so backends (and failure-injecting test doubles) are
//! interchangeable.

mod memory;

pub use memory::{MemoryStore, SessionDetail};

use crate::models::{
    AssignmentId, AssignmentRow, AssignmentStatus, ClubId, Court, CourtId, LifecycleError,
    PairKey, PartnerPair, PlayerId, PlayerStatus, Session, SessionId, SessionPlayer,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Store operation failure.
#[derive(Clone, Debug, PartialEq)]
pub enum StoreError {
    SessionNotFound(SessionId),
    ClubNotFound(ClubId),
    CourtNotFound(CourtId),
    PlayerNotFound(PlayerId),
    AssignmentNotFound(AssignmentId),
    /// A player with this name is already in the session's pool.
    DuplicatePlayer(String),
    /// A lifecycle action applied in the wrong session status.
    Lifecycle(LifecycleError),
    /// The in-memory lock was poisoned by a panicking writer.
    Poisoned,
    /// Backend failure (I/O, connectivity). Also what test doubles inject.
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::SessionNotFound(id) => write!(f, "Session {} not found", id),
            StoreError::ClubNotFound(id) => write!(f, "Club {} not found", id),
            StoreError::CourtNotFound(id) => write!(f, "Court {} not found", id),
            StoreError::PlayerNotFound(id) => write!(f, "Player {} not found", id),
            StoreError::AssignmentNotFound(id) => write!(f, "Assignment {} not found", id),
            StoreError::DuplicatePlayer(name) => {
                write!(f, "A player named {} is already in this session", name)
            }
            StoreError::Lifecycle(e) => write!(f, "{}", e),
            StoreError::Poisoned => write!(f, "Store lock poisoned"),
            StoreError::Backend(msg) => write!(f, "Store backend error: {}", msg),
        }
    }
}

impl From<LifecycleError> for StoreError {
    fn from(e: LifecycleError) -> Self {
        StoreError::Lifecycle(e)
    }
}

/// A logged session event (selection runs, auto-termination).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub session_id: SessionId,
    pub at: DateTime<Utc>,
    pub kind: String,
    pub payload: serde_json::Value,
}

/// Everything the phase driver needs from the outside world.
///
/// Methods are fine-grained so the driver composes them in the order the
/// state machine requires; each is an independent atomic operation.
pub trait Store {
    // Reads
    fn session(&self, id: SessionId) -> Result<Session, StoreError>;
    /// Ids of sessions in `Running` status (the driver's work list).
    fn running_sessions(&self) -> Result<Vec<SessionId>, StoreError>;
    /// Pool members with status available, playing, or resting.
    fn eligible_players(&self, id: SessionId) -> Result<Vec<SessionPlayer>, StoreError>;
    fn player(&self, id: SessionId, player_id: PlayerId) -> Result<SessionPlayer, StoreError>;
    /// The club's first `limit` courts by name, minus locked ones.
    fn unlocked_courts(&self, club_id: ClubId, limit: usize) -> Result<Vec<Court>, StoreError>;
    fn partner_history(&self, id: SessionId) -> Result<Vec<PartnerPair>, StoreError>;
    /// Highest round number assigned so far (0 when none).
    fn max_round(&self, id: SessionId) -> Result<u32, StoreError>;
    fn assignments_with_status(
        &self,
        id: SessionId,
        status: AssignmentStatus,
    ) -> Result<Vec<AssignmentRow>, StoreError>;

    // Selection lock: atomic compare-and-swap on the session's `selecting`
    // flag. `try_acquire` returns false when another selection holds it.
    fn try_acquire_selection_lock(&self, id: SessionId) -> Result<bool, StoreError>;
    fn release_selection_lock(&self, id: SessionId) -> Result<(), StoreError>;

    // Writes
    fn insert_assignments(&self, rows: Vec<AssignmentRow>) -> Result<(), StoreError>;
    fn set_assignments_status(
        &self,
        id: SessionId,
        from: AssignmentStatus,
        to: AssignmentStatus,
    ) -> Result<(), StoreError>;
    /// Replace the player on one assignment row (manual swap).
    fn reassign_player(
        &self,
        id: SessionId,
        assignment_id: AssignmentId,
        player_id: PlayerId,
    ) -> Result<(), StoreError>;
    /// Move every player whose status is in `from` to `to`.
    fn reset_player_statuses(
        &self,
        id: SessionId,
        from: &[PlayerStatus],
        to: PlayerStatus,
    ) -> Result<(), StoreError>;
    fn set_player_status(
        &self,
        id: SessionId,
        player_id: PlayerId,
        status: PlayerStatus,
    ) -> Result<(), StoreError>;
    /// Mark players as playing: +1 game, fresh last-played timestamp.
    fn mark_playing(
        &self,
        id: SessionId,
        player_ids: &[PlayerId],
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    /// Increment each pair's times-paired count by one.
    fn record_pairs(&self, id: SessionId, pairs: &[PairKey]) -> Result<(), StoreError>;
    /// Enter the playing phase: reset the round clock, clear the
    /// pre-selection flag.
    fn begin_round(&self, id: SessionId, now: DateTime<Utc>) -> Result<(), StoreError>;
    /// Enter the resting phase.
    fn begin_rest(&self, id: SessionId, now: DateTime<Utc>) -> Result<(), StoreError>;
    fn set_next_round_selected(&self, id: SessionId, selected: bool) -> Result<(), StoreError>;
    /// Force the session to ended status, idle phase.
    fn end_session(&self, id: SessionId, now: DateTime<Utc>) -> Result<(), StoreError>;
    fn log_event(
        &self,
        id: SessionId,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<(), StoreError>;
}
