//! Selection engine: partition the available pool into court groupings for
//! one round.

use crate::logic::combos::{best_doubles_combo, best_mixed_combo, TeamSplit};
use crate::logic::game_type::decide_game_types;
use crate::models::{
    build_pair_lookup, CourtGroup, GameType, Gender, PairLookup, PartnerPair, PlayerId, PoolPlayer,
    SessionConfig,
};
use rand::Rng;
use std::collections::HashSet;

/// Select players for up to `num_courts` courts.
///
/// 1. Sort the pool ascending by effective games, random tie-break.
/// 2. Gate the working set to the `floor(pool/4) * 4` fairest players.
/// 3. Plan per-court game types from the ratio and gender supply.
/// 4. Fill mixed courts first, then doubles, downgrading or upgrading
///    courts whose planned type the remaining supply cannot support.
///
/// Courts that cannot be filled contribute no grouping; the result can
/// legitimately cover fewer courts than requested, or be empty.
pub fn select_players(
    pool: &[PoolPlayer],
    num_courts: usize,
    config: &SessionConfig,
    history: &[PartnerPair],
) -> Vec<CourtGroup> {
    if pool.len() < 4 {
        return Vec::new();
    }

    // Fairness ordering with a random tie-break, re-rolled every run so
    // equal-game players rotate instead of settling into a fixed order.
    let mut rng = rand::thread_rng();
    let mut decorated: Vec<(PoolPlayer, u32)> =
        pool.iter().map(|p| (*p, rng.gen::<u32>())).collect();
    decorated.sort_by_key(|(p, t)| (p.effective_games(), *t));

    let actual_courts = num_courts.min(decorated.len() / 4);
    if actual_courts == 0 {
        return Vec::new();
    }
    let selected: Vec<PoolPlayer> = decorated
        .into_iter()
        .take(actual_courts * 4)
        .map(|(p, _)| p)
        .collect();

    let game_types = decide_game_types(actual_courts, config.mixed_ratio, &selected);
    let pairs = build_pair_lookup(history);

    assign_to_courts(&selected, game_types, config, &pairs)
}

/// Two-pass fill over the planned court types. Gender shape is a hard
/// constraint; the planned type per court is not.
fn assign_to_courts(
    selected: &[PoolPlayer],
    mut game_types: Vec<GameType>,
    config: &SessionConfig,
    pairs: &PairLookup,
) -> Vec<CourtGroup> {
    let males: Vec<PoolPlayer> = selected
        .iter()
        .filter(|p| p.gender == Some(Gender::Male))
        .copied()
        .collect();
    let females: Vec<PoolPlayer> = selected
        .iter()
        .filter(|p| p.gender == Some(Gender::Female))
        .copied()
        .collect();

    let mut groups: Vec<CourtGroup> = Vec::new();
    let mut used: HashSet<PlayerId> = HashSet::new();

    // First pass: mixed courts. Insufficient gender supply downgrades the
    // court to doubles for the second pass.
    for i in 0..game_types.len() {
        if game_types[i] != GameType::Mixed {
            continue;
        }
        let avail_m: Vec<PoolPlayer> = males.iter().filter(|p| !used.contains(&p.id)).copied().collect();
        let avail_f: Vec<PoolPlayer> = females.iter().filter(|p| !used.contains(&p.id)).copied().collect();

        match best_mixed_combo(&avail_m, &avail_f, config, pairs) {
            Some(split) => {
                mark_used(&mut used, &split);
                groups.push(to_group(i, GameType::Mixed, split));
            }
            None => game_types[i] = GameType::Doubles,
        }
    }

    // Second pass: doubles courts (planned or downgraded) from whoever is
    // left, unknowns included.
    let mut doubles_pool: Vec<PoolPlayer> = selected
        .iter()
        .filter(|p| !used.contains(&p.id))
        .copied()
        .collect();

    for i in 0..game_types.len() {
        if game_types[i] != GameType::Doubles {
            continue;
        }
        if doubles_pool.len() < 4 {
            break;
        }

        if let Some(split) = best_doubles_combo(&doubles_pool, config, pairs) {
            remove_from_pool(&mut doubles_pool, &split);
            groups.push(to_group(i, GameType::Doubles, split));
            continue;
        }

        // Strict gender blocked a cross-gender four; the residual supply may
        // still support one more mixed court.
        let pool_m: Vec<PoolPlayer> = doubles_pool
            .iter()
            .filter(|p| p.gender == Some(Gender::Male))
            .copied()
            .collect();
        let pool_f: Vec<PoolPlayer> = doubles_pool
            .iter()
            .filter(|p| p.gender == Some(Gender::Female))
            .copied()
            .collect();
        if let Some(split) = best_mixed_combo(&pool_m, &pool_f, config, pairs) {
            remove_from_pool(&mut doubles_pool, &split);
            groups.push(to_group(i, GameType::Mixed, split));
        }
        // Otherwise this court sits empty for the round.
    }

    groups.sort_by_key(|g| g.court_index);
    groups
}

fn to_group(court_index: usize, game_type: GameType, split: TeamSplit) -> CourtGroup {
    CourtGroup {
        court_index,
        game_type,
        team_a: split.team_a,
        team_b: split.team_b,
    }
}

fn mark_used(used: &mut HashSet<PlayerId>, split: &TeamSplit) {
    for p in split.team_a.iter().chain(split.team_b.iter()) {
        used.insert(p.id);
    }
}

fn remove_from_pool(pool: &mut Vec<PoolPlayer>, split: &TeamSplit) {
    let ids: HashSet<PlayerId> = split
        .team_a
        .iter()
        .chain(split.team_b.iter())
        .map(|p| p.id)
        .collect();
    pool.retain(|p| !ids.contains(&p.id));
}
