//! Bounded combo search: enumerate team splits over a capped candidate
//! slice and keep the best-scoring one.

use crate::logic::scoring::score_grouping;
use crate::models::{Gender, PairLookup, PoolPlayer, SessionConfig};

/// Candidate cap per gender when searching mixed groupings.
const MIXED_CANDIDATES: usize = 6;

/// Candidate cap when searching doubles groupings.
const DOUBLES_CANDIDATES: usize = 8;

/// The three ways a quartet [0,1,2,3] splits into two teams of two.
const QUAD_SPLITS: [([usize; 2], [usize; 2]); 3] =
    [([0, 1], [2, 3]), ([0, 2], [1, 3]), ([0, 3], [1, 2])];

/// A scored 2v2 split.
#[derive(Clone, Debug, PartialEq)]
pub struct TeamSplit {
    pub team_a: [PoolPlayer; 2],
    pub team_b: [PoolPlayer; 2],
}

/// All k-element index combinations of `0..len`, in lexicographic order.
/// Candidate slices are small (≤ 8), so the counts stay tiny: C(8,4) = 70.
pub fn index_combinations(len: usize, k: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    let mut current = Vec::with_capacity(k);
    fn recurse(len: usize, k: usize, start: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if current.len() == k {
            out.push(current.clone());
            return;
        }
        // Leave room for the remaining picks.
        let remaining = k - current.len();
        for i in start..=(len.saturating_sub(remaining)) {
            current.push(i);
            recurse(len, k, i + 1, current, out);
            current.pop();
        }
    }
    if k <= len {
        recurse(len, k, 0, &mut current, &mut out);
    }
    out
}

/// Best 2M+2F grouping from the given per-gender candidate lists, or `None`
/// when either gender cannot supply a pair. Mixed teams always pair one male
/// with one female, so each quartet has exactly two valid splits.
pub fn best_mixed_combo(
    males: &[PoolPlayer],
    females: &[PoolPlayer],
    config: &SessionConfig,
    pairs: &PairLookup,
) -> Option<TeamSplit> {
    let top_m = &males[..males.len().min(MIXED_CANDIDATES)];
    let top_f = &females[..females.len().min(MIXED_CANDIDATES)];
    if top_m.len() < 2 || top_f.len() < 2 {
        return None;
    }

    let mut best: Option<(f64, TeamSplit)> = None;
    for m_pair in index_combinations(top_m.len(), 2) {
        for f_pair in index_combinations(top_f.len(), 2) {
            let (m1, m2) = (top_m[m_pair[0]], top_m[m_pair[1]]);
            let (f1, f2) = (top_f[f_pair[0]], top_f[f_pair[1]]);
            for (a2, b2) in [(f1, f2), (f2, f1)] {
                let split = TeamSplit {
                    team_a: [m1, a2],
                    team_b: [m2, b2],
                };
                consider(&mut best, split, config, pairs);
            }
        }
    }
    best.map(|(_, split)| split)
}

/// Best doubles grouping from the pool. Tries a same-gender four first,
/// starting with whichever gender has at least as many candidates; only when
/// neither gender can field four does it search the full slice, and only if
/// strict gender is off.
pub fn best_doubles_combo(
    pool: &[PoolPlayer],
    config: &SessionConfig,
    pairs: &PairLookup,
) -> Option<TeamSplit> {
    let males: Vec<PoolPlayer> = pool
        .iter()
        .filter(|p| p.gender == Some(Gender::Male))
        .copied()
        .collect();
    let females: Vec<PoolPlayer> = pool
        .iter()
        .filter(|p| p.gender == Some(Gender::Female))
        .copied()
        .collect();

    let gender_pools = if males.len() >= females.len() {
        [males, females]
    } else {
        [females, males]
    };

    for g_pool in &gender_pools {
        if g_pool.len() < 4 {
            continue;
        }
        let top = &g_pool[..g_pool.len().min(DOUBLES_CANDIDATES)];
        if let Some(split) = best_four_from(top, config, pairs) {
            return Some(split);
        }
    }

    if !config.strict_gender && pool.len() >= 4 {
        let top = &pool[..pool.len().min(DOUBLES_CANDIDATES)];
        return best_four_from(top, config, pairs);
    }

    None
}

/// Best split over every quartet drawn from the slice, all three splits per
/// quartet.
fn best_four_from(
    top: &[PoolPlayer],
    config: &SessionConfig,
    pairs: &PairLookup,
) -> Option<TeamSplit> {
    if top.len() < 4 {
        return None;
    }

    let mut best: Option<(f64, TeamSplit)> = None;
    for quad in index_combinations(top.len(), 4) {
        let four = [top[quad[0]], top[quad[1]], top[quad[2]], top[quad[3]]];
        for (t1, t2) in QUAD_SPLITS {
            let split = TeamSplit {
                team_a: [four[t1[0]], four[t1[1]]],
                team_b: [four[t2[0]], four[t2[1]]],
            };
            consider(&mut best, split, config, pairs);
        }
    }
    best.map(|(_, split)| split)
}

fn consider(
    best: &mut Option<(f64, TeamSplit)>,
    split: TeamSplit,
    config: &SessionConfig,
    pairs: &PairLookup,
) {
    let score = score_grouping(&split.team_a, &split.team_b, config, pairs);
    match best {
        Some((best_score, _)) if score <= *best_score => {}
        _ => *best = Some((score, split)),
    }
}
