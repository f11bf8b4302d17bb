//! Partner history: how often two players have shared a court this session.

use crate::models::assignment::CourtGroup;
use crate::models::player::PlayerId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Canonical unordered pair of player ids: the smaller id always comes
/// first, so (a, b) and (b, a) key the same entry.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct PairKey(PlayerId, PlayerId);

impl PairKey {
    pub fn new(a: PlayerId, b: PlayerId) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    pub fn first(&self) -> PlayerId {
        self.0
    }

    pub fn second(&self) -> PlayerId {
        self.1
    }
}

/// A stored history entry: pair plus times shared a court.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PartnerPair {
    pub pair: PairKey,
    pub times_paired: u32,
}

/// Lookup form used by the scoring function.
pub type PairLookup = HashMap<PairKey, u32>;

/// Build the scoring lookup from stored history rows.
pub fn build_pair_lookup(history: &[PartnerPair]) -> PairLookup {
    history
        .iter()
        .map(|h| (h.pair, h.times_paired))
        .collect()
}

/// All unordered pairs placed together by a round's groupings, teammates and
/// opponents alike: six per court.
pub fn extract_pairs(groups: &[CourtGroup]) -> Vec<PairKey> {
    let mut pairs = Vec::new();
    for group in groups {
        let ids: Vec<PlayerId> = group.players().map(|p| p.id).collect();
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                pairs.push(PairKey::new(ids[i], ids[j]));
            }
        }
    }
    pairs
}
