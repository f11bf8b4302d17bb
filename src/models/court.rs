//! Courts belong to a club; a session plays on the first N unlocked ones.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a court.
pub type CourtId = Uuid;

/// Unique identifier for a club.
pub type ClubId = Uuid;

/// A physical court. Locked courts are skipped when a round is formed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Court {
    pub id: CourtId,
    pub club_id: ClubId,
    pub name: String,
    pub locked: bool,
}

impl Court {
    pub fn new(club_id: ClubId, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            club_id,
            name: name.into(),
            locked: false,
        }
    }
}

/// A club: owns courts and hosts sessions.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Club {
    pub id: ClubId,
    pub name: String,
}

impl Club {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}
