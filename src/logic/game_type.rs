//! Per-court game-type planning from gender supply and the mixed-ratio
//! target.

use crate::models::{GameType, Gender, PoolPlayer};

/// Decide which courts play mixed vs doubles. A planning hint only: the
/// selection passes may still downgrade or upgrade individual courts when
/// the rostered players cannot support the planned type.
///
/// Each mixed court consumes exactly 2 males + 2 females, so the supply cap
/// is `min(males/2, females/2)`; the ratio sets the target within that cap.
pub fn decide_game_types(
    num_courts: usize,
    mixed_ratio: u32,
    players: &[PoolPlayer],
) -> Vec<GameType> {
    let males = players
        .iter()
        .filter(|p| p.gender == Some(Gender::Male))
        .count();
    let females = players
        .iter()
        .filter(|p| p.gender == Some(Gender::Female))
        .count();

    let max_mixed = (males / 2).min(females / 2).min(num_courts);
    let target_mixed = (f64::from(mixed_ratio) / 100.0 * num_courts as f64).round() as usize;
    let actual_mixed = target_mixed.min(max_mixed);

    let mut types = vec![GameType::Mixed; actual_mixed];
    types.resize(num_courts, GameType::Doubles);
    types
}
