//! Court rotation web app: library with models, selection logic, store, and
//! the phase driver.

pub mod logic;
pub mod models;
pub mod scheduler;
pub mod store;

pub use logic::{
    best_doubles_combo, best_mixed_combo, decide_game_types, pair_penalty, score_grouping,
    select_players,
};
pub use models::{
    build_pair_lookup, extract_pairs, AssignmentId, AssignmentRow, AssignmentStatus, Club, ClubId,
    ConfigError, Court, CourtGroup, CourtId, GameType, Gender, PairKey, PartnerPair, PlayerId,
    PlayerStatus, PoolPlayer, Session, SessionConfig, SessionId, SessionPhase, SessionPlayer,
    SessionStatus,
};
pub use scheduler::{
    run_selection, swap_players, tick, tick_all, LogNotifier, Notifier, RoundKind, RoundNotice,
    SchedulerError, SelectionOutcome, SwapOutcome, TickOutcome,
};
pub use store::{MemoryStore, SessionDetail, Store, StoreError};
