//! In-memory store: the backend used by the single-binary server and the
//! integration tests. All state sits behind one `RwLock`.

use crate::models::{
    AssignmentId, AssignmentRow, AssignmentStatus, Club, ClubId, Court, CourtId, Gender, PairKey,
    PartnerPair, PlayerId, PlayerStatus, Session, SessionConfig, SessionId, SessionPhase,
    SessionPlayer, SessionStatus,
};
use crate::store::{EventRecord, Store, StoreError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    clubs: HashMap<ClubId, Club>,
    courts: HashMap<ClubId, Vec<Court>>,
    sessions: HashMap<SessionId, Session>,
    players: HashMap<SessionId, Vec<SessionPlayer>>,
    assignments: HashMap<SessionId, Vec<AssignmentRow>>,
    history: HashMap<SessionId, HashMap<PairKey, u32>>,
    events: HashMap<SessionId, Vec<EventRecord>>,
}

/// Everything a client needs to render one session.
#[derive(Clone, Debug, Serialize)]
pub struct SessionDetail {
    pub session: Session,
    pub players: Vec<SessionPlayer>,
    pub assignments: Vec<AssignmentRow>,
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }

    // ---- management surface (used by the web binary, not the driver) ----

    pub fn create_club(&self, name: impl Into<String>) -> Result<Club, StoreError> {
        let club = Club::new(name);
        let mut g = self.write()?;
        g.courts.insert(club.id, Vec::new());
        g.clubs.insert(club.id, club.clone());
        Ok(club)
    }

    pub fn add_court(
        &self,
        club_id: ClubId,
        name: impl Into<String>,
    ) -> Result<Court, StoreError> {
        let mut g = self.write()?;
        if !g.clubs.contains_key(&club_id) {
            return Err(StoreError::ClubNotFound(club_id));
        }
        let court = Court::new(club_id, name);
        g.courts.entry(club_id).or_default().push(court.clone());
        Ok(court)
    }

    pub fn toggle_court_lock(
        &self,
        club_id: ClubId,
        court_id: CourtId,
    ) -> Result<Court, StoreError> {
        let mut g = self.write()?;
        let courts = g
            .courts
            .get_mut(&club_id)
            .ok_or(StoreError::ClubNotFound(club_id))?;
        let court = courts
            .iter_mut()
            .find(|c| c.id == court_id)
            .ok_or(StoreError::CourtNotFound(court_id))?;
        court.locked = !court.locked;
        Ok(court.clone())
    }

    pub fn create_session(
        &self,
        club_id: ClubId,
        config: SessionConfig,
    ) -> Result<Session, StoreError> {
        let mut g = self.write()?;
        if !g.clubs.contains_key(&club_id) {
            return Err(StoreError::ClubNotFound(club_id));
        }
        let session = Session::new(club_id, config);
        let id = session.id;
        g.sessions.insert(id, session.clone());
        g.players.insert(id, Vec::new());
        g.assignments.insert(id, Vec::new());
        g.history.insert(id, HashMap::new());
        g.events.insert(id, Vec::new());
        Ok(session)
    }

    pub fn update_session_config(
        &self,
        id: SessionId,
        config: SessionConfig,
    ) -> Result<Session, StoreError> {
        let mut g = self.write()?;
        let session = session_mut(&mut g, id)?;
        session.update_config(config)?;
        Ok(session.clone())
    }

    pub fn start_session(&self, id: SessionId, now: DateTime<Utc>) -> Result<Session, StoreError> {
        let mut g = self.write()?;
        let session = session_mut(&mut g, id)?;
        session.start(now)?;
        Ok(session.clone())
    }

    pub fn pause_session(&self, id: SessionId) -> Result<Session, StoreError> {
        let mut g = self.write()?;
        let session = session_mut(&mut g, id)?;
        session.pause()?;
        Ok(session.clone())
    }

    pub fn resume_session(&self, id: SessionId) -> Result<Session, StoreError> {
        let mut g = self.write()?;
        let session = session_mut(&mut g, id)?;
        session.resume()?;
        Ok(session.clone())
    }

    /// Add a player to the session's pool. Names are unique per session,
    /// case-insensitive.
    pub fn add_player(
        &self,
        id: SessionId,
        name: impl Into<String>,
        gender: Option<Gender>,
        level: u8,
    ) -> Result<SessionPlayer, StoreError> {
        let name = name.into();
        let mut g = self.write()?;
        if !g.sessions.contains_key(&id) {
            return Err(StoreError::SessionNotFound(id));
        }
        let players = g.players.entry(id).or_default();
        let duplicate = players.iter().any(|p| {
            p.status != PlayerStatus::Removed && p.name.eq_ignore_ascii_case(name.trim())
        });
        if duplicate {
            return Err(StoreError::DuplicatePlayer(name));
        }
        let player = SessionPlayer::new(name.trim(), gender, level);
        players.push(player.clone());
        Ok(player)
    }

    /// Remove a player from the pool. Players mid-game keep their current
    /// assignment and finish the round; they are just never selected again.
    /// Returns true when removal was deferred this way.
    pub fn remove_player(&self, id: SessionId, player_id: PlayerId) -> Result<bool, StoreError> {
        let mut g = self.write()?;
        let players = g
            .players
            .get_mut(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        let player = players
            .iter_mut()
            .find(|p| p.id == player_id)
            .ok_or(StoreError::PlayerNotFound(player_id))?;
        let deferred = player.status == PlayerStatus::Playing;
        player.status = PlayerStatus::Removed;
        Ok(deferred)
    }

    pub fn session_detail(&self, id: SessionId) -> Result<SessionDetail, StoreError> {
        let g = self.read()?;
        let session = g
            .sessions
            .get(&id)
            .ok_or(StoreError::SessionNotFound(id))?
            .clone();
        Ok(SessionDetail {
            session,
            players: g.players.get(&id).cloned().unwrap_or_default(),
            assignments: g.assignments.get(&id).cloned().unwrap_or_default(),
        })
    }

    pub fn events(&self, id: SessionId) -> Result<Vec<EventRecord>, StoreError> {
        let g = self.read()?;
        if !g.sessions.contains_key(&id) {
            return Err(StoreError::SessionNotFound(id));
        }
        Ok(g.events.get(&id).cloned().unwrap_or_default())
    }
}

fn session_mut(g: &mut Inner, id: SessionId) -> Result<&mut Session, StoreError> {
    g.sessions
        .get_mut(&id)
        .ok_or(StoreError::SessionNotFound(id))
}

impl Store for MemoryStore {
    fn session(&self, id: SessionId) -> Result<Session, StoreError> {
        let g = self.read()?;
        g.sessions
            .get(&id)
            .cloned()
            .ok_or(StoreError::SessionNotFound(id))
    }

    fn running_sessions(&self) -> Result<Vec<SessionId>, StoreError> {
        let g = self.read()?;
        Ok(g.sessions
            .values()
            .filter(|s| s.status == SessionStatus::Running)
            .map(|s| s.id)
            .collect())
    }

    fn eligible_players(&self, id: SessionId) -> Result<Vec<SessionPlayer>, StoreError> {
        let g = self.read()?;
        let players = g.players.get(&id).ok_or(StoreError::SessionNotFound(id))?;
        Ok(players.iter().filter(|p| p.is_poolable()).cloned().collect())
    }

    fn player(&self, id: SessionId, player_id: PlayerId) -> Result<SessionPlayer, StoreError> {
        let g = self.read()?;
        let players = g.players.get(&id).ok_or(StoreError::SessionNotFound(id))?;
        players
            .iter()
            .find(|p| p.id == player_id)
            .cloned()
            .ok_or(StoreError::PlayerNotFound(player_id))
    }

    fn unlocked_courts(&self, club_id: ClubId, limit: usize) -> Result<Vec<Court>, StoreError> {
        let g = self.read()?;
        let courts = g
            .courts
            .get(&club_id)
            .ok_or(StoreError::ClubNotFound(club_id))?;
        let mut ordered = courts.clone();
        ordered.sort_by(|a, b| a.name.cmp(&b.name));
        // Limit first, then drop locked: a locked court inside the session's
        // first N shrinks the round rather than pulling in court N+1.
        Ok(ordered
            .into_iter()
            .take(limit)
            .filter(|c| !c.locked)
            .collect())
    }

    fn partner_history(&self, id: SessionId) -> Result<Vec<PartnerPair>, StoreError> {
        let g = self.read()?;
        let history = g.history.get(&id).ok_or(StoreError::SessionNotFound(id))?;
        Ok(history
            .iter()
            .map(|(&pair, &times_paired)| PartnerPair { pair, times_paired })
            .collect())
    }

    fn max_round(&self, id: SessionId) -> Result<u32, StoreError> {
        let g = self.read()?;
        let rows = g
            .assignments
            .get(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        Ok(rows.iter().map(|r| r.round).max().unwrap_or(0))
    }

    fn assignments_with_status(
        &self,
        id: SessionId,
        status: AssignmentStatus,
    ) -> Result<Vec<AssignmentRow>, StoreError> {
        let g = self.read()?;
        let rows = g
            .assignments
            .get(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        Ok(rows.iter().filter(|r| r.status == status).cloned().collect())
    }

    fn try_acquire_selection_lock(&self, id: SessionId) -> Result<bool, StoreError> {
        let mut g = self.write()?;
        let session = session_mut(&mut g, id)?;
        if session.selecting {
            return Ok(false);
        }
        session.selecting = true;
        Ok(true)
    }

    fn release_selection_lock(&self, id: SessionId) -> Result<(), StoreError> {
        let mut g = self.write()?;
        session_mut(&mut g, id)?.selecting = false;
        Ok(())
    }

    fn insert_assignments(&self, rows: Vec<AssignmentRow>) -> Result<(), StoreError> {
        let mut g = self.write()?;
        for row in rows {
            g.assignments
                .get_mut(&row.session_id)
                .ok_or(StoreError::SessionNotFound(row.session_id))?
                .push(row);
        }
        Ok(())
    }

    fn set_assignments_status(
        &self,
        id: SessionId,
        from: AssignmentStatus,
        to: AssignmentStatus,
    ) -> Result<(), StoreError> {
        let mut g = self.write()?;
        let rows = g
            .assignments
            .get_mut(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        for row in rows.iter_mut().filter(|r| r.status == from) {
            row.status = to;
        }
        Ok(())
    }

    fn reassign_player(
        &self,
        id: SessionId,
        assignment_id: AssignmentId,
        player_id: PlayerId,
    ) -> Result<(), StoreError> {
        let mut g = self.write()?;
        let rows = g
            .assignments
            .get_mut(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        let row = rows
            .iter_mut()
            .find(|r| r.id == assignment_id)
            .ok_or(StoreError::AssignmentNotFound(assignment_id))?;
        row.player_id = player_id;
        Ok(())
    }

    fn reset_player_statuses(
        &self,
        id: SessionId,
        from: &[PlayerStatus],
        to: PlayerStatus,
    ) -> Result<(), StoreError> {
        let mut g = self.write()?;
        let players = g
            .players
            .get_mut(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        for p in players.iter_mut().filter(|p| from.contains(&p.status)) {
            p.status = to;
        }
        Ok(())
    }

    fn set_player_status(
        &self,
        id: SessionId,
        player_id: PlayerId,
        status: PlayerStatus,
    ) -> Result<(), StoreError> {
        let mut g = self.write()?;
        let players = g
            .players
            .get_mut(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        let player = players
            .iter_mut()
            .find(|p| p.id == player_id)
            .ok_or(StoreError::PlayerNotFound(player_id))?;
        player.status = status;
        Ok(())
    }

    fn mark_playing(
        &self,
        id: SessionId,
        player_ids: &[PlayerId],
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut g = self.write()?;
        let players = g
            .players
            .get_mut(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        for &pid in player_ids {
            let player = players
                .iter_mut()
                .find(|p| p.id == pid)
                .ok_or(StoreError::PlayerNotFound(pid))?;
            player.record_game(now);
        }
        Ok(())
    }

    fn record_pairs(&self, id: SessionId, pairs: &[PairKey]) -> Result<(), StoreError> {
        let mut g = self.write()?;
        let history = g
            .history
            .get_mut(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        for &pair in pairs {
            *history.entry(pair).or_insert(0) += 1;
        }
        Ok(())
    }

    fn begin_round(&self, id: SessionId, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut g = self.write()?;
        let session = session_mut(&mut g, id)?;
        session.phase = SessionPhase::Playing;
        session.round_started_at = Some(now);
        session.next_round_selected = false;
        Ok(())
    }

    fn begin_rest(&self, id: SessionId, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut g = self.write()?;
        let session = session_mut(&mut g, id)?;
        session.phase = SessionPhase::Resting;
        session.round_started_at = Some(now);
        session.next_round_selected = false;
        Ok(())
    }

    fn set_next_round_selected(&self, id: SessionId, selected: bool) -> Result<(), StoreError> {
        let mut g = self.write()?;
        session_mut(&mut g, id)?.next_round_selected = selected;
        Ok(())
    }

    fn end_session(&self, id: SessionId, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut g = self.write()?;
        session_mut(&mut g, id)?.end(now);
        Ok(())
    }

    fn log_event(
        &self,
        id: SessionId,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<(), StoreError> {
        let mut g = self.write()?;
        if !g.sessions.contains_key(&id) {
            return Err(StoreError::SessionNotFound(id));
        }
        let record = EventRecord {
            id: Uuid::new_v4(),
            session_id: id,
            at: Utc::now(),
            kind: kind.to_string(),
            payload,
        };
        g.events.entry(id).or_default().push(record);
        Ok(())
    }
}
