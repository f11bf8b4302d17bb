//! Scoring for candidate 2v2 groupings. Pure: higher is better.

use crate::models::{PairKey, PairLookup, PlayerId, PoolPlayer, SessionConfig, LEVEL_MAX, LEVEL_MIN};

/// Opponent-pair history counts at this fraction of a teammate pair's weight.
/// Tunable; 0.3 keeps "played against" mattering without dominating.
pub const OPPONENT_WEIGHT: f64 = 0.3;

/// Fairness always matters, independent of the user-facing knobs.
const FAIRNESS_WEIGHT: f64 = 0.3;

/// Damping constant for the total-games fairness term.
const GAMES_DAMPING: f64 = 0.05;

/// Score a candidate grouping of two teams under the session's weights.
///
/// Three components, each normalized to [0, 1]:
/// - skill balance: closeness of team average levels
/// - partner variety: low repeat counts across the six pairs on court
/// - fairness: low total games played across the four players
pub fn score_grouping(
    team_a: &[PoolPlayer; 2],
    team_b: &[PoolPlayer; 2],
    config: &SessionConfig,
    pairs: &PairLookup,
) -> f64 {
    // Skill balance: team averages, normalized by the max level spread.
    let avg_a = f64::from(team_a[0].level + team_a[1].level) / 2.0;
    let avg_b = f64::from(team_b[0].level + team_b[1].level) / 2.0;
    let spread = f64::from(LEVEL_MAX - LEVEL_MIN);
    let skill_score = (1.0 - (avg_a - avg_b).abs() / spread).clamp(0.0, 1.0);

    // Partner variety: two teammate pairs at full weight, four opponent
    // pairs averaged and weighted down.
    let pen_a = pair_penalty(team_a[0].id, team_a[1].id, pairs);
    let pen_b = pair_penalty(team_b[0].id, team_b[1].id, pairs);
    let opponent_pens = [
        pair_penalty(team_a[0].id, team_b[0].id, pairs),
        pair_penalty(team_a[0].id, team_b[1].id, pairs),
        pair_penalty(team_a[1].id, team_b[0].id, pairs),
        pair_penalty(team_a[1].id, team_b[1].id, pairs),
    ];
    let avg_opponent = opponent_pens.iter().sum::<f64>() / opponent_pens.len() as f64;
    let variety_score =
        1.0 - (pen_a + pen_b + avg_opponent * OPPONENT_WEIGHT) / (2.0 + OPPONENT_WEIGHT);

    // Fairness: groupings of low-game players score higher.
    let total_games: u32 = team_a
        .iter()
        .chain(team_b.iter())
        .map(|p| p.games_played)
        .sum();
    let fairness_score = 1.0 / (1.0 + f64::from(total_games) * GAMES_DAMPING);

    let w_skill = f64::from(config.skill_balance) / 100.0;
    let w_variety = f64::from(config.partner_variety) / 100.0;

    w_skill * skill_score + w_variety * variety_score + FAIRNESS_WEIGHT * fairness_score
}

/// Repeat penalty for one pair: 0 when never paired, then diminishing
/// returns (1 repeat = 0.5, 2 = 0.67, 3 = 0.75, ...), approaching but never
/// reaching 1.
pub fn pair_penalty(a: PlayerId, b: PlayerId, pairs: &PairLookup) -> f64 {
    let times = pairs.get(&PairKey::new(a, b)).copied().unwrap_or(0);
    f64::from(times) / f64::from(times + 1)
}
