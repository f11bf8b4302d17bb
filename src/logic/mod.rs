//! Selection engine: scoring, combo search, game-type planning, selection.

mod combos;
mod game_type;
mod scoring;
mod selection;

pub use combos::{best_doubles_combo, best_mixed_combo, index_combinations, TeamSplit};
pub use game_type::decide_game_types;
pub use scoring::{pair_penalty, score_grouping, OPPONENT_WEIGHT};
pub use selection::select_players;
