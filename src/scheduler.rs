//! Phase driver: advances each running session through idle/playing/resting
//! on elapsed wall-clock time, invoking the selection engine at transition
//! boundaries under the session's exclusive selection lock.
//!
//! The driver is stateless between calls; every entry point takes `now`
//! explicitly so the periodic sweep and the tests share one code path.

use crate::logic::select_players;
use crate::models::{
    extract_pairs, AssignmentRow, AssignmentStatus, PlayerId, PlayerStatus, SessionId,
    SessionPhase, SessionStatus, TeamSide,
};
use crate::store::{Store, StoreError};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;

/// Hard cap on session length; exceeded sessions are force-ended.
pub const MAX_SESSION_HOURS: i64 = 6;

/// Sweep interval for the background tick loop.
pub const TICK_INTERVAL_SECS: u64 = 10;

/// Whether a selection run produces the current round or a pre-selected
/// next round.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RoundKind {
    Active,
    Upcoming,
}

/// Driver failure.
#[derive(Clone, Debug, PartialEq)]
pub enum SchedulerError {
    Store(StoreError),
    /// The selection lock is held; another run is in flight.
    SelectionInProgress,
    /// Swap asked for the same player twice.
    SamePlayer,
    /// Neither swap player is placed on a court.
    NeitherOnCourt,
    /// Swap across an active and an upcoming round.
    CrossRoundSwap,
}

impl std::fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerError::Store(e) => write!(f, "{}", e),
            SchedulerError::SelectionInProgress => write!(f, "Selection already in progress"),
            SchedulerError::SamePlayer => write!(f, "Two different players required"),
            SchedulerError::NeitherOnCourt => write!(f, "Neither player is on a court"),
            SchedulerError::CrossRoundSwap => {
                write!(f, "Cannot swap between active and upcoming rounds")
            }
        }
    }
}

impl From<StoreError> for SchedulerError {
    fn from(e: StoreError) -> Self {
        SchedulerError::Store(e)
    }
}

/// What one tick did to a session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TickOutcome {
    /// Session not running, or a selection is already in flight.
    Skipped,
    /// Session exceeded the hard time cap and was force-ended.
    AutoEnded,
    /// A fresh round was selected and is now playing.
    RoundStarted(u32),
    /// The next round was pre-selected mid-play.
    NextRoundSelected(u32),
    /// Play time elapsed; the rest phase began.
    RestStarted,
    /// A pre-selected round was promoted to active without re-scoring.
    RoundPromoted(u32),
    /// Timers still running, nothing to do.
    NoChange,
}

impl std::fmt::Display for TickOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TickOutcome::Skipped => write!(f, "skipped"),
            TickOutcome::AutoEnded => write!(f, "auto-ended ({}h limit)", MAX_SESSION_HOURS),
            TickOutcome::RoundStarted(r) => write!(f, "selection -> playing (round {})", r),
            TickOutcome::NextRoundSelected(r) => write!(f, "mid-round -> round {} pre-selected", r),
            TickOutcome::RestStarted => write!(f, "playing -> resting"),
            TickOutcome::RoundPromoted(r) => write!(f, "promoted round {} -> playing", r),
            TickOutcome::NoChange => write!(f, "no change"),
        }
    }
}

/// Result of one selection run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionOutcome {
    /// Assignments were written for `courts` courts in round `round`.
    Assigned { round: u32, courts: usize },
    /// Pool was empty; nothing selected.
    NoPlayers,
    /// Every usable court is locked; nothing selected.
    NoCourts,
    /// Supply could not fill a single court (e.g. fewer than 4 players).
    NoGroups,
}

/// Result of a manual swap.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapOutcome {
    /// Both players were placed; their court slots were exchanged.
    CourtToCourt,
    /// One placed player was replaced by one from the pool.
    CourtToPool,
}

/// Per-player notification payload for a freshly selected round.
#[derive(Clone, Debug, PartialEq)]
pub struct RoundNotice {
    pub player_id: PlayerId,
    pub round: u32,
    pub court_name: String,
    /// Names of the other three players on the court.
    pub teammates: Vec<String>,
    /// True for pre-selected rounds ("you're up next").
    pub upcoming: bool,
}

/// Delivery seam for player notifications; push transport lives outside the
/// core.
pub trait Notifier {
    fn round_ready(&self, session_id: SessionId, notices: &[RoundNotice]);
}

/// Default notifier: writes each notice to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn round_ready(&self, session_id: SessionId, notices: &[RoundNotice]) {
        for n in notices {
            log::info!(
                "session {}: round {} {} -> player {} on {} with {}",
                session_id,
                n.round,
                if n.upcoming { "(upcoming)" } else { "(active)" },
                n.player_id,
                n.court_name,
                n.teammates.join(", "),
            );
        }
    }
}

/// One sweep over every running session. Per-session failures are returned
/// alongside the successes; one broken session never stalls the rest.
pub fn tick_all(
    store: &dyn Store,
    notifier: &dyn Notifier,
    now: DateTime<Utc>,
) -> Vec<(SessionId, Result<TickOutcome, SchedulerError>)> {
    let ids = match store.running_sessions() {
        Ok(ids) => ids,
        Err(e) => {
            log::error!("Tick sweep failed to list running sessions: {}", e);
            return Vec::new();
        }
    };
    ids.into_iter()
        .map(|id| {
            let result = tick(store, notifier, id, now);
            (id, result)
        })
        .collect()
}

/// One phase-driver evaluation step for one session. Idempotent when called
/// again before any timer elapses.
pub fn tick(
    store: &dyn Store,
    notifier: &dyn Notifier,
    session_id: SessionId,
    now: DateTime<Utc>,
) -> Result<TickOutcome, SchedulerError> {
    let session = store.session(session_id)?;
    if session.status != SessionStatus::Running || session.selecting {
        return Ok(TickOutcome::Skipped);
    }

    if let Some(started) = session.started_at {
        if now - started >= Duration::hours(MAX_SESSION_HOURS) {
            store.end_session(session_id, now)?;
            store.log_event(
                session_id,
                "session_auto_ended",
                json!({ "reason": format!("{}h time limit", MAX_SESSION_HOURS) }),
            )?;
            log::warn!("Session {} auto-ended after {}h", session_id, MAX_SESSION_HOURS);
            return Ok(TickOutcome::AutoEnded);
        }
    }

    let elapsed = match session.phase_elapsed(now) {
        Some(e) if session.phase != SessionPhase::Idle => e,
        // No round in flight: start one.
        _ => return selection_tick(store, notifier, session_id, RoundKind::Active, now),
    };

    match session.phase {
        SessionPhase::Playing => {
            let play = Duration::minutes(i64::from(session.config.play_minutes));
            let lead = Duration::minutes(i64::from(
                session
                    .config
                    .selection_lead_minutes
                    .unwrap_or(session.config.play_minutes),
            ));

            // Mid-round lookahead fires once, and only when the lead time
            // genuinely precedes the end of play.
            if !session.next_round_selected && lead < play && elapsed >= lead {
                return selection_tick(store, notifier, session_id, RoundKind::Upcoming, now);
            }

            if elapsed >= play {
                if session.config.rest_minutes > 0 {
                    store.begin_rest(session_id, now)?;
                    log::info!("Session {}: playing -> resting", session_id);
                    return Ok(TickOutcome::RestStarted);
                }
                return promote_or_select(store, notifier, session_id, now);
            }
            Ok(TickOutcome::NoChange)
        }
        SessionPhase::Resting => {
            let rest = Duration::minutes(i64::from(session.config.rest_minutes));
            if elapsed >= rest {
                return promote_or_select(store, notifier, session_id, now);
            }
            Ok(TickOutcome::NoChange)
        }
        SessionPhase::Idle => Ok(TickOutcome::NoChange),
    }
}

/// Run a selection from a tick, mapping lock contention to a skip: the next
/// sweep simply retries.
fn selection_tick(
    store: &dyn Store,
    notifier: &dyn Notifier,
    session_id: SessionId,
    kind: RoundKind,
    now: DateTime<Utc>,
) -> Result<TickOutcome, SchedulerError> {
    match run_selection(store, notifier, session_id, kind, now) {
        Ok(SelectionOutcome::Assigned { round, .. }) => Ok(match kind {
            RoundKind::Active => TickOutcome::RoundStarted(round),
            RoundKind::Upcoming => TickOutcome::NextRoundSelected(round),
        }),
        // Supply shortfalls are normal: leave the phase alone and retry on a
        // later tick once the pool changes.
        Ok(_) => Ok(TickOutcome::NoChange),
        Err(SchedulerError::SelectionInProgress) => Ok(TickOutcome::Skipped),
        Err(e) => Err(e),
    }
}

/// Promote the pre-selected round if one exists, otherwise select fresh.
///
/// Promotion is a pure status flip: the grouping was already computed, so no
/// scoring runs and no new assignment rows are written.
fn promote_or_select(
    store: &dyn Store,
    notifier: &dyn Notifier,
    session_id: SessionId,
    now: DateTime<Utc>,
) -> Result<TickOutcome, SchedulerError> {
    let upcoming = store.assignments_with_status(session_id, AssignmentStatus::Upcoming)?;
    if upcoming.is_empty() {
        return selection_tick(store, notifier, session_id, RoundKind::Active, now);
    }

    store.reset_player_statuses(
        session_id,
        &[PlayerStatus::Playing, PlayerStatus::Selected],
        PlayerStatus::Available,
    )?;
    store.set_assignments_status(session_id, AssignmentStatus::Active, AssignmentStatus::Finished)?;
    store.set_assignments_status(session_id, AssignmentStatus::Upcoming, AssignmentStatus::Active)?;

    let round = store.max_round(session_id)?;
    let player_ids: Vec<PlayerId> = store
        .assignments_with_status(session_id, AssignmentStatus::Active)?
        .into_iter()
        .filter(|r| r.round == round)
        .map(|r| r.player_id)
        .collect();
    store.mark_playing(session_id, &player_ids, now)?;
    store.begin_round(session_id, now)?;

    // Players already got their "up next" notice when the round was
    // pre-selected; promotion is silent.
    log::info!("Session {}: promoted round {} -> playing", session_id, round);
    Ok(TickOutcome::RoundPromoted(round))
}

/// Run the selection engine for one session under its exclusive lock, write
/// the results, and notify the placed players.
///
/// Shared by the periodic driver and the manual "run selection now" action;
/// both see the same lock discipline. The lock is released on every path,
/// including store failures.
pub fn run_selection(
    store: &dyn Store,
    notifier: &dyn Notifier,
    session_id: SessionId,
    kind: RoundKind,
    now: DateTime<Utc>,
) -> Result<SelectionOutcome, SchedulerError> {
    if !store.try_acquire_selection_lock(session_id)? {
        return Err(SchedulerError::SelectionInProgress);
    }
    let result = select_locked(store, notifier, session_id, kind, now);
    if let Err(e) = store.release_selection_lock(session_id) {
        log::error!(
            "Session {}: failed to release selection lock: {}",
            session_id,
            e
        );
    }
    result
}

fn select_locked(
    store: &dyn Store,
    notifier: &dyn Notifier,
    session_id: SessionId,
    kind: RoundKind,
    now: DateTime<Utc>,
) -> Result<SelectionOutcome, SchedulerError> {
    let session = store.session(session_id)?;

    let players = store.eligible_players(session_id)?;
    if players.is_empty() {
        return Ok(SelectionOutcome::NoPlayers);
    }

    let courts = store.unlocked_courts(
        session.club_id,
        session.config.number_of_courts as usize,
    )?;
    if courts.is_empty() {
        return Ok(SelectionOutcome::NoCourts);
    }

    let history = store.partner_history(session_id)?;
    let pool: Vec<_> = players.iter().map(|p| p.pool_view()).collect();

    let groups = select_players(&pool, courts.len(), &session.config, &history);
    if groups.is_empty() {
        return Ok(SelectionOutcome::NoGroups);
    }

    let round = store.max_round(session_id)? + 1;
    let status = match kind {
        RoundKind::Active => AssignmentStatus::Active,
        RoundKind::Upcoming => AssignmentStatus::Upcoming,
    };

    let mut rows = Vec::new();
    let mut selected_ids: Vec<PlayerId> = Vec::new();
    for group in &groups {
        let court = &courts[group.court_index];
        for (side, team) in [(TeamSide::A, &group.team_a), (TeamSide::B, &group.team_b)] {
            for p in team {
                rows.push(AssignmentRow::new(
                    session_id, court.id, p.id, round, status, group.game_type, side,
                ));
                selected_ids.push(p.id);
            }
        }
    }
    if kind == RoundKind::Active {
        // Retire the previous round before its successor's rows go in, so
        // at most one round is ever active.
        store.set_assignments_status(
            session_id,
            AssignmentStatus::Active,
            AssignmentStatus::Finished,
        )?;
    }
    store.insert_assignments(rows)?;
    store.record_pairs(session_id, &extract_pairs(&groups))?;

    match kind {
        RoundKind::Active => {
            store.reset_player_statuses(
                session_id,
                &[PlayerStatus::Playing, PlayerStatus::Selected],
                PlayerStatus::Available,
            )?;
            store.mark_playing(session_id, &selected_ids, now)?;
            store.begin_round(session_id, now)?;
        }
        RoundKind::Upcoming => {
            store.set_next_round_selected(session_id, true)?;
        }
    }

    let name_of: HashMap<PlayerId, &str> =
        players.iter().map(|p| (p.id, p.name.as_str())).collect();
    let mut notices = Vec::new();
    for group in &groups {
        let court = &courts[group.court_index];
        let ids: Vec<PlayerId> = group.players().map(|p| p.id).collect();
        for &pid in &ids {
            let teammates = ids
                .iter()
                .filter(|&&other| other != pid)
                .map(|other| name_of.get(other).copied().unwrap_or("Player").to_string())
                .collect();
            notices.push(RoundNotice {
                player_id: pid,
                round,
                court_name: court.name.clone(),
                teammates,
                upcoming: kind == RoundKind::Upcoming,
            });
        }
    }
    notifier.round_ready(session_id, &notices);

    store.log_event(
        session_id,
        "selection_run",
        json!({
            "round": round,
            "assignment_status": status.as_str(),
            "courts": groups
                .iter()
                .map(|g| {
                    json!({
                        "court_index": g.court_index,
                        "game_type": g.game_type.as_str(),
                        "team_a": g.team_a.iter().map(|p| p.id).collect::<Vec<_>>(),
                        "team_b": g.team_b.iter().map(|p| p.id).collect::<Vec<_>>(),
                    })
                })
                .collect::<Vec<_>>(),
        }),
    )?;

    Ok(SelectionOutcome::Assigned {
        round,
        courts: groups.len(),
    })
}

/// Manager-initiated swap of two players across the current (or upcoming)
/// court layout.
///
/// Both placed: their slots are exchanged, provided both sit in the same
/// round kind. One placed: the pool player takes the court slot; statuses
/// and play counts follow (an active stand-in is playing immediately, an
/// upcoming stand-in is merely selected).
pub fn swap_players(
    store: &dyn Store,
    session_id: SessionId,
    player_a: PlayerId,
    player_b: PlayerId,
    now: DateTime<Utc>,
) -> Result<SwapOutcome, SchedulerError> {
    if player_a == player_b {
        return Err(SchedulerError::SamePlayer);
    }

    let active = store.assignments_with_status(session_id, AssignmentStatus::Active)?;
    let upcoming = store.assignments_with_status(session_id, AssignmentStatus::Upcoming)?;

    // Prefer a player's upcoming slot, then the active one, latest round
    // first in both cases.
    let find = |player: PlayerId| -> Option<AssignmentRow> {
        let latest = |rows: &[AssignmentRow]| {
            rows.iter()
                .filter(|r| r.player_id == player)
                .max_by_key(|r| r.round)
                .cloned()
        };
        latest(&upcoming).or_else(|| latest(&active))
    };

    match (find(player_a), find(player_b)) {
        (None, None) => Err(SchedulerError::NeitherOnCourt),
        (Some(row_a), Some(row_b)) => {
            if row_a.status != row_b.status {
                return Err(SchedulerError::CrossRoundSwap);
            }
            store.reassign_player(session_id, row_a.id, player_b)?;
            store.reassign_player(session_id, row_b.id, player_a)?;
            Ok(SwapOutcome::CourtToCourt)
        }
        (Some(row), None) => swap_in_from_pool(store, session_id, row, player_b, now),
        (None, Some(row)) => swap_in_from_pool(store, session_id, row, player_a, now),
    }
}

/// Replace a placed player with one from the pool.
fn swap_in_from_pool(
    store: &dyn Store,
    session_id: SessionId,
    row: AssignmentRow,
    incoming: PlayerId,
    now: DateTime<Utc>,
) -> Result<SwapOutcome, SchedulerError> {
    let outgoing = row.player_id;
    store.reassign_player(session_id, row.id, incoming)?;
    store.set_player_status(session_id, outgoing, PlayerStatus::Available)?;
    if row.status == AssignmentStatus::Active {
        store.mark_playing(session_id, &[incoming], now)?;
    } else {
        store.set_player_status(session_id, incoming, PlayerStatus::Selected)?;
    }
    Ok(SwapOutcome::CourtToPool)
}
