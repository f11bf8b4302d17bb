//! Integration tests for the phase driver: transitions, pre-selection,
//! promotion, the selection lock, and auto-termination.

use chrono::{DateTime, Duration, TimeZone, Utc};
use court_rotation_web::{
    run_selection, swap_players, tick, AssignmentId, AssignmentRow, AssignmentStatus, ClubId,
    Court, LogNotifier, MemoryStore, Notifier, PairKey, PartnerPair, PlayerId, PlayerStatus,
    RoundKind, RoundNotice, SchedulerError, Session, SessionConfig, SessionId, SessionPhase,
    SessionPlayer, SessionStatus, Store, StoreError, SwapOutcome, TickOutcome,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 18, 0, 0).unwrap()
}

fn minutes(m: i64) -> Duration {
    Duration::minutes(m)
}

fn test_config() -> SessionConfig {
    SessionConfig {
        number_of_courts: 1,
        play_minutes: 15,
        rest_minutes: 0,
        selection_lead_minutes: Some(10),
        mixed_ratio: 0,
        skill_balance: 70,
        partner_variety: 80,
        strict_gender: false,
    }
}

/// Club with `courts` courts, one running session, `players` genderless
/// players in the pool.
fn store_with_session(players: usize, courts: usize, config: SessionConfig) -> (MemoryStore, SessionId) {
    let store = MemoryStore::new();
    let club = store.create_club("Test Club").unwrap();
    for i in 0..courts {
        store.add_court(club.id, format!("Court {}", i + 1)).unwrap();
    }
    let session = store.create_session(club.id, config).unwrap();
    for i in 0..players {
        store
            .add_player(session.id, format!("P{}", i), None, 3)
            .unwrap();
    }
    store.start_session(session.id, t0()).unwrap();
    (store, session.id)
}

/// Notifier capturing every notice for assertions.
#[derive(Default)]
struct RecordingNotifier {
    notices: Mutex<Vec<RoundNotice>>,
}

impl Notifier for RecordingNotifier {
    fn round_ready(&self, _session_id: SessionId, notices: &[RoundNotice]) {
        self.notices.lock().unwrap().extend(notices.iter().cloned());
    }
}

#[test]
fn idle_tick_selects_and_starts_playing() {
    let (store, id) = store_with_session(4, 1, test_config());
    let notifier = RecordingNotifier::default();

    let outcome = tick(&store, &notifier, id, t0()).unwrap();
    assert_eq!(outcome, TickOutcome::RoundStarted(1));

    let session = store.session(id).unwrap();
    assert_eq!(session.phase, SessionPhase::Playing);
    assert_eq!(session.round_started_at, Some(t0()));
    assert!(!session.selecting, "lock must be released after selection");

    let active = store.assignments_with_status(id, AssignmentStatus::Active).unwrap();
    assert_eq!(active.len(), 4);
    assert!(active.iter().all(|r| r.round == 1));

    for p in store.eligible_players(id).unwrap() {
        assert_eq!(p.status, PlayerStatus::Playing);
        assert_eq!(p.play_count, 1);
        assert_eq!(p.last_played_at, Some(t0()));
    }

    // Each placed player hears about their court and three teammates.
    let notices = notifier.notices.lock().unwrap();
    assert_eq!(notices.len(), 4);
    assert!(notices.iter().all(|n| !n.upcoming && n.teammates.len() == 3));

    let events = store.events(id).unwrap();
    assert!(events.iter().any(|e| e.kind == "selection_run"));
}

#[test]
fn tick_does_nothing_while_timers_run() {
    let (store, id) = store_with_session(4, 1, test_config());
    tick(&store, &LogNotifier, id, t0()).unwrap();

    let outcome = tick(&store, &LogNotifier, id, t0() + minutes(5)).unwrap();
    assert_eq!(outcome, TickOutcome::NoChange);
    assert_eq!(
        store.assignments_with_status(id, AssignmentStatus::Active).unwrap().len(),
        4
    );
}

#[test]
fn lead_time_preselects_the_next_round() {
    let (store, id) = store_with_session(8, 1, test_config());
    let notifier = RecordingNotifier::default();
    tick(&store, &LogNotifier, id, t0()).unwrap();

    let outcome = tick(&store, &notifier, id, t0() + minutes(10)).unwrap();
    assert_eq!(outcome, TickOutcome::NextRoundSelected(2));

    let session = store.session(id).unwrap();
    assert!(session.next_round_selected);
    assert_eq!(session.phase, SessionPhase::Playing, "active round undisturbed");

    let upcoming = store.assignments_with_status(id, AssignmentStatus::Upcoming).unwrap();
    assert_eq!(upcoming.len(), 4);
    assert!(upcoming.iter().all(|r| r.round == 2));

    // The four idle players get picked (virtual +1 deprioritizes the four
    // already on court) and are notified as upcoming, without status change.
    let notices = notifier.notices.lock().unwrap();
    assert!(notices.iter().all(|n| n.upcoming));
    for row in &upcoming {
        let p = store.player(id, row.player_id).unwrap();
        assert_eq!(p.status, PlayerStatus::Available);
        assert_eq!(p.play_count, 0);
    }

    // The lookahead fires once.
    let again = tick(&store, &LogNotifier, id, t0() + minutes(11)).unwrap();
    assert_eq!(again, TickOutcome::NoChange);
}

#[test]
fn play_end_promotes_the_preselected_round_without_reselecting() {
    let (store, id) = store_with_session(8, 1, test_config());
    tick(&store, &LogNotifier, id, t0()).unwrap();
    tick(&store, &LogNotifier, id, t0() + minutes(10)).unwrap();

    let upcoming_ids: HashSet<_> = store
        .assignments_with_status(id, AssignmentStatus::Upcoming)
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();

    let promote_at = t0() + minutes(15);
    let outcome = tick(&store, &LogNotifier, id, promote_at).unwrap();
    assert_eq!(outcome, TickOutcome::RoundPromoted(2));

    // The exact pre-computed rows went active: same row ids, no re-scoring,
    // no new rows.
    let active = store.assignments_with_status(id, AssignmentStatus::Active).unwrap();
    let active_ids: HashSet<_> = active.iter().map(|r| r.id).collect();
    assert_eq!(active_ids, upcoming_ids);
    assert!(store
        .assignments_with_status(id, AssignmentStatus::Upcoming)
        .unwrap()
        .is_empty());

    // Round 1 rows are history now.
    let finished = store.assignments_with_status(id, AssignmentStatus::Finished).unwrap();
    assert_eq!(finished.len(), 4);
    assert!(finished.iter().all(|r| r.round == 1));

    let session = store.session(id).unwrap();
    assert_eq!(session.phase, SessionPhase::Playing);
    assert_eq!(session.round_started_at, Some(promote_at));
    assert!(!session.next_round_selected);

    // Round 2 players are playing; round 1 players went back to available.
    for row in &active {
        let p = store.player(id, row.player_id).unwrap();
        assert_eq!(p.status, PlayerStatus::Playing);
        assert_eq!(p.play_count, 1);
    }
    for row in &finished {
        let p = store.player(id, row.player_id).unwrap();
        assert_eq!(p.status, PlayerStatus::Available);
    }
}

#[test]
fn rest_phase_runs_between_rounds() {
    let config = SessionConfig {
        rest_minutes: 5,
        selection_lead_minutes: None,
        ..test_config()
    };
    let (store, id) = store_with_session(4, 1, config);
    tick(&store, &LogNotifier, id, t0()).unwrap();

    let outcome = tick(&store, &LogNotifier, id, t0() + minutes(15)).unwrap();
    assert_eq!(outcome, TickOutcome::RestStarted);
    assert_eq!(store.session(id).unwrap().phase, SessionPhase::Resting);

    let outcome = tick(&store, &LogNotifier, id, t0() + minutes(17)).unwrap();
    assert_eq!(outcome, TickOutcome::NoChange);

    // Rest elapsed, no upcoming round exists: select fresh.
    let outcome = tick(&store, &LogNotifier, id, t0() + minutes(20)).unwrap();
    assert_eq!(outcome, TickOutcome::RoundStarted(2));
    assert_eq!(store.session(id).unwrap().phase, SessionPhase::Playing);
}

#[test]
fn session_auto_ends_after_six_hours() {
    let (store, id) = store_with_session(4, 1, test_config());
    tick(&store, &LogNotifier, id, t0()).unwrap();

    let outcome = tick(&store, &LogNotifier, id, t0() + Duration::hours(6)).unwrap();
    assert_eq!(outcome, TickOutcome::AutoEnded);

    let session = store.session(id).unwrap();
    assert_eq!(session.status, SessionStatus::Ended);
    assert_eq!(session.phase, SessionPhase::Idle);
    assert!(session.ended_at.is_some());
    assert!(store
        .events(id)
        .unwrap()
        .iter()
        .any(|e| e.kind == "session_auto_ended"));

    // Ended sessions are frozen.
    let outcome = tick(&store, &LogNotifier, id, t0() + Duration::hours(7)).unwrap();
    assert_eq!(outcome, TickOutcome::Skipped);
}

#[test]
fn paused_sessions_are_skipped() {
    let (store, id) = store_with_session(4, 1, test_config());
    store.pause_session(id).unwrap();

    let outcome = tick(&store, &LogNotifier, id, t0()).unwrap();
    assert_eq!(outcome, TickOutcome::Skipped);
}

#[test]
fn selection_lock_admits_exactly_one() {
    let (store, id) = store_with_session(4, 1, test_config());

    assert!(store.try_acquire_selection_lock(id).unwrap());
    assert!(!store.try_acquire_selection_lock(id).unwrap());
    store.release_selection_lock(id).unwrap();
    assert!(store.try_acquire_selection_lock(id).unwrap());
    store.release_selection_lock(id).unwrap();
}

#[test]
fn concurrent_lock_attempts_admit_exactly_one() {
    let (store, id) = store_with_session(4, 1, test_config());
    let store = Arc::new(store);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        handles.push(std::thread::spawn(move || {
            store.try_acquire_selection_lock(id).unwrap()
        }));
    }
    let acquired = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|&ok| ok)
        .count();
    assert_eq!(acquired, 1, "exactly one concurrent acquire may win");
}

#[test]
fn tick_skips_while_selection_is_in_flight() {
    let (store, id) = store_with_session(4, 1, test_config());
    assert!(store.try_acquire_selection_lock(id).unwrap());

    let outcome = tick(&store, &LogNotifier, id, t0()).unwrap();
    assert_eq!(outcome, TickOutcome::Skipped);

    let manual = run_selection(&store, &LogNotifier, id, RoundKind::Active, t0());
    assert_eq!(manual.unwrap_err(), SchedulerError::SelectionInProgress);

    store.release_selection_lock(id).unwrap();
}

#[test]
fn lock_is_released_after_a_store_failure() {
    let (store, id) = store_with_session(4, 1, test_config());
    let failing = FailingStore { inner: store };

    let result = run_selection(&failing, &LogNotifier, id, RoundKind::Active, t0());
    assert!(matches!(
        result,
        Err(SchedulerError::Store(StoreError::Backend(_)))
    ));

    // The write blew up mid-selection; the lock must not leak.
    assert!(!failing.inner.session(id).unwrap().selecting);
}

#[test]
fn empty_pool_leaves_the_session_idle() {
    let (store, id) = store_with_session(0, 1, test_config());

    let outcome = tick(&store, &LogNotifier, id, t0()).unwrap();
    assert_eq!(outcome, TickOutcome::NoChange);

    let session = store.session(id).unwrap();
    assert_eq!(session.phase, SessionPhase::Idle);
    assert!(!session.selecting);
}

#[test]
fn locked_courts_sit_out_the_rotation() {
    let config = SessionConfig {
        number_of_courts: 2,
        ..test_config()
    };
    let (store, id) = store_with_session(8, 2, config);
    let club_id = store.session(id).unwrap().club_id;
    let court = store.unlocked_courts(club_id, 2).unwrap()[1].clone();
    store.toggle_court_lock(club_id, court.id).unwrap();

    tick(&store, &LogNotifier, id, t0()).unwrap();

    let active = store.assignments_with_status(id, AssignmentStatus::Active).unwrap();
    assert_eq!(active.len(), 4, "only the unlocked court is filled");
    assert!(active.iter().all(|r| r.court_id != court.id));
}

#[test]
fn removed_player_finishes_the_round_but_leaves_the_pool() {
    let (store, id) = store_with_session(4, 1, test_config());
    tick(&store, &LogNotifier, id, t0()).unwrap();

    let playing = store.assignments_with_status(id, AssignmentStatus::Active).unwrap();
    let leaving = playing[0].player_id;
    let deferred = store.remove_player(id, leaving).unwrap();
    assert!(deferred, "mid-game removal must be deferred");

    // Current round untouched.
    assert_eq!(
        store.assignments_with_status(id, AssignmentStatus::Active).unwrap().len(),
        4
    );
    // Only three players remain poolable: the next round cannot form.
    assert_eq!(store.eligible_players(id).unwrap().len(), 3);
    let outcome = tick(&store, &LogNotifier, id, t0() + minutes(15)).unwrap();
    assert_eq!(outcome, TickOutcome::NoChange);
}

#[test]
fn swap_brings_a_pool_player_onto_the_court() {
    let (store, id) = store_with_session(5, 1, test_config());
    tick(&store, &LogNotifier, id, t0()).unwrap();

    let on_court: Vec<PlayerId> = store
        .assignments_with_status(id, AssignmentStatus::Active)
        .unwrap()
        .iter()
        .map(|r| r.player_id)
        .collect();
    let benched = store
        .eligible_players(id)
        .unwrap()
        .into_iter()
        .find(|p| !on_court.contains(&p.id))
        .unwrap();

    let swap_at = t0() + minutes(3);
    let outcome = swap_players(&store, id, on_court[0], benched.id, swap_at).unwrap();
    assert_eq!(outcome, SwapOutcome::CourtToPool);

    let incoming = store.player(id, benched.id).unwrap();
    assert_eq!(incoming.status, PlayerStatus::Playing);
    assert_eq!(incoming.play_count, 1);
    let outgoing = store.player(id, on_court[0]).unwrap();
    assert_eq!(outgoing.status, PlayerStatus::Available);

    let active_ids: Vec<PlayerId> = store
        .assignments_with_status(id, AssignmentStatus::Active)
        .unwrap()
        .iter()
        .map(|r| r.player_id)
        .collect();
    assert!(active_ids.contains(&benched.id));
    assert!(!active_ids.contains(&on_court[0]));
}

#[test]
fn swap_rejects_degenerate_requests() {
    let (store, id) = store_with_session(6, 1, test_config());
    tick(&store, &LogNotifier, id, t0()).unwrap();

    let on_court: Vec<PlayerId> = store
        .assignments_with_status(id, AssignmentStatus::Active)
        .unwrap()
        .iter()
        .map(|r| r.player_id)
        .collect();
    let benched: Vec<PlayerId> = store
        .eligible_players(id)
        .unwrap()
        .into_iter()
        .filter(|p| !on_court.contains(&p.id))
        .map(|p| p.id)
        .collect();

    assert_eq!(
        swap_players(&store, id, on_court[0], on_court[0], t0()).unwrap_err(),
        SchedulerError::SamePlayer
    );
    assert_eq!(
        swap_players(&store, id, benched[0], benched[1], t0()).unwrap_err(),
        SchedulerError::NeitherOnCourt
    );
}

#[test]
fn partner_history_accumulates_all_six_pairs() {
    let (store, id) = store_with_session(4, 1, test_config());
    tick(&store, &LogNotifier, id, t0()).unwrap();

    let history = store.partner_history(id).unwrap();
    assert_eq!(history.len(), 6, "four players share six unordered pairs");
    assert!(history.iter().all(|h| h.times_paired == 1));
}

/// Store double that fails the assignment write, for lock-leak coverage.
struct FailingStore {
    inner: MemoryStore,
}

impl Store for FailingStore {
    fn session(&self, id: SessionId) -> Result<Session, StoreError> {
        self.inner.session(id)
    }

    fn running_sessions(&self) -> Result<Vec<SessionId>, StoreError> {
        self.inner.running_sessions()
    }

    fn eligible_players(&self, id: SessionId) -> Result<Vec<SessionPlayer>, StoreError> {
        self.inner.eligible_players(id)
    }

    fn player(&self, id: SessionId, player_id: PlayerId) -> Result<SessionPlayer, StoreError> {
        self.inner.player(id, player_id)
    }

    fn unlocked_courts(&self, club_id: ClubId, limit: usize) -> Result<Vec<Court>, StoreError> {
        self.inner.unlocked_courts(club_id, limit)
    }

    fn partner_history(&self, id: SessionId) -> Result<Vec<PartnerPair>, StoreError> {
        self.inner.partner_history(id)
    }

    fn max_round(&self, id: SessionId) -> Result<u32, StoreError> {
        self.inner.max_round(id)
    }

    fn assignments_with_status(
        &self,
        id: SessionId,
        status: AssignmentStatus,
    ) -> Result<Vec<AssignmentRow>, StoreError> {
        self.inner.assignments_with_status(id, status)
    }

    fn try_acquire_selection_lock(&self, id: SessionId) -> Result<bool, StoreError> {
        self.inner.try_acquire_selection_lock(id)
    }

    fn release_selection_lock(&self, id: SessionId) -> Result<(), StoreError> {
        self.inner.release_selection_lock(id)
    }

    fn insert_assignments(&self, _rows: Vec<AssignmentRow>) -> Result<(), StoreError> {
        Err(StoreError::Backend("simulated write failure".into()))
    }

    fn set_assignments_status(
        &self,
        id: SessionId,
        from: AssignmentStatus,
        to: AssignmentStatus,
    ) -> Result<(), StoreError> {
        self.inner.set_assignments_status(id, from, to)
    }

    fn reassign_player(
        &self,
        id: SessionId,
        assignment_id: AssignmentId,
        player_id: PlayerId,
    ) -> Result<(), StoreError> {
        self.inner.reassign_player(id, assignment_id, player_id)
    }

    fn reset_player_statuses(
        &self,
        id: SessionId,
        from: &[PlayerStatus],
        to: PlayerStatus,
    ) -> Result<(), StoreError> {
        self.inner.reset_player_statuses(id, from, to)
    }

    fn set_player_status(
        &self,
        id: SessionId,
        player_id: PlayerId,
        status: PlayerStatus,
    ) -> Result<(), StoreError> {
        self.inner.set_player_status(id, player_id, status)
    }

    fn mark_playing(
        &self,
        id: SessionId,
        player_ids: &[PlayerId],
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.inner.mark_playing(id, player_ids, now)
    }

    fn record_pairs(&self, id: SessionId, pairs: &[PairKey]) -> Result<(), StoreError> {
        self.inner.record_pairs(id, pairs)
    }

    fn begin_round(&self, id: SessionId, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.inner.begin_round(id, now)
    }

    fn begin_rest(&self, id: SessionId, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.inner.begin_rest(id, now)
    }

    fn set_next_round_selected(&self, id: SessionId, selected: bool) -> Result<(), StoreError> {
        self.inner.set_next_round_selected(id, selected)
    }

    fn end_session(&self, id: SessionId, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.inner.end_session(id, now)
    }

    fn log_event(
        &self,
        id: SessionId,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<(), StoreError> {
        self.inner.log_event(id, kind, payload)
    }
}
