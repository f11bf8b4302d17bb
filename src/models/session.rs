//! Session: configuration, lifecycle status, and the current phase/timers
//! the driver advances.

use crate::models::court::ClubId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a session.
pub type SessionId = Uuid;

/// Skill level bounds used by level clamping and skill-balance scoring.
pub const LEVEL_MIN: u8 = 1;
pub const LEVEL_MAX: u8 = 5;

/// A lifecycle action applied to a session in the wrong status.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LifecycleError {
    pub status: SessionStatus,
    pub action: &'static str,
}

impl std::fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cannot {} a {:?} session", self.action, self.status)
    }
}

/// Invalid session settings, rejected before they reach the algorithm.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// A percentage knob is outside 0-100.
    RatioOutOfRange(&'static str, u32),
    /// Court count must be at least 1.
    NoCourts,
    /// Play time must be at least 1 minute.
    NoPlayTime,
    /// Selection lead time must be at least 1 minute when set.
    ZeroLeadTime,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::RatioOutOfRange(name, v) => {
                write!(f, "{} must be between 0 and 100 (got {})", name, v)
            }
            ConfigError::NoCourts => write!(f, "Session needs at least 1 court"),
            ConfigError::NoPlayTime => write!(f, "Play time must be at least 1 minute"),
            ConfigError::ZeroLeadTime => {
                write!(f, "Selection lead time must be at least 1 minute")
            }
        }
    }
}

/// Session settings: timers, court count, and the algorithm knobs.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How many of the club's courts this session uses.
    pub number_of_courts: u32,
    pub play_minutes: u32,
    /// 0 = no rest phase; rounds roll straight into each other.
    pub rest_minutes: u32,
    /// Minutes into a round at which the next round is pre-selected.
    /// Only fires when strictly less than the play time; `None` disables it.
    pub selection_lead_minutes: Option<u32>,
    /// Target share of mixed courts, 0-100.
    pub mixed_ratio: u32,
    /// Weight of the skill-balance objective, 0-100.
    pub skill_balance: u32,
    /// Weight of the partner-variety objective, 0-100.
    pub partner_variety: u32,
    /// Forbid cross-gender doubles groupings entirely.
    pub strict_gender: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            number_of_courts: 2,
            play_minutes: 15,
            rest_minutes: 5,
            selection_lead_minutes: None,
            mixed_ratio: 50,
            skill_balance: 70,
            partner_variety: 80,
            strict_gender: false,
        }
    }
}

impl SessionConfig {
    /// Range-check every knob. Called at the API boundary so the engine and
    /// driver can assume well-formed settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, v) in [
            ("mixed_ratio", self.mixed_ratio),
            ("skill_balance", self.skill_balance),
            ("partner_variety", self.partner_variety),
        ] {
            if v > 100 {
                return Err(ConfigError::RatioOutOfRange(name, v));
            }
        }
        if self.number_of_courts == 0 {
            return Err(ConfigError::NoCourts);
        }
        if self.play_minutes == 0 {
            return Err(ConfigError::NoPlayTime);
        }
        if self.selection_lead_minutes == Some(0) {
            return Err(ConfigError::ZeroLeadTime);
        }
        Ok(())
    }
}

/// Coarse lifecycle of a session. Only `Running` sessions are ticked.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Being configured; pool may be assembled.
    #[default]
    Draft,
    /// Published to members, not yet started.
    Initiated,
    Running,
    Paused,
    Ended,
}

/// Fine-grained phase within a running session.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No round in flight; the next tick starts one.
    #[default]
    Idle,
    Playing,
    Resting,
}

/// A recurring-play session: the unit the phase driver operates on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub club_id: ClubId,
    pub config: SessionConfig,
    pub status: SessionStatus,
    pub phase: SessionPhase,
    /// When the session went running (basis for the 6h auto-end).
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// When the current phase (round or rest) began.
    pub round_started_at: Option<DateTime<Utc>>,
    /// Exclusive-selection flag; set and cleared via atomic store updates.
    pub selecting: bool,
    /// The next round has been pre-selected mid-round.
    pub next_round_selected: bool,
}

impl Session {
    pub fn new(club_id: ClubId, config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            club_id,
            config,
            status: SessionStatus::Draft,
            phase: SessionPhase::Idle,
            started_at: None,
            ended_at: None,
            round_started_at: None,
            selecting: false,
            next_round_selected: false,
        }
    }

    /// Elapsed time in the current phase, if a phase is in flight.
    pub fn phase_elapsed(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.round_started_at.map(|t| now - t)
    }

    /// Publish a draft session to members.
    pub fn initiate(&mut self) -> Result<(), LifecycleError> {
        if self.status != SessionStatus::Draft {
            return Err(LifecycleError {
                status: self.status,
                action: "initiate",
            });
        }
        self.status = SessionStatus::Initiated;
        Ok(())
    }

    /// Start running: the driver picks the session up on its next sweep.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        if !matches!(self.status, SessionStatus::Draft | SessionStatus::Initiated) {
            return Err(LifecycleError {
                status: self.status,
                action: "start",
            });
        }
        self.status = SessionStatus::Running;
        self.started_at = Some(now);
        Ok(())
    }

    /// Freeze the session; the driver skips paused sessions entirely.
    pub fn pause(&mut self) -> Result<(), LifecycleError> {
        if self.status != SessionStatus::Running {
            return Err(LifecycleError {
                status: self.status,
                action: "pause",
            });
        }
        self.status = SessionStatus::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), LifecycleError> {
        if self.status != SessionStatus::Paused {
            return Err(LifecycleError {
                status: self.status,
                action: "resume",
            });
        }
        self.status = SessionStatus::Running;
        Ok(())
    }

    /// End the session. Idempotent on already-ended sessions.
    pub fn end(&mut self, now: DateTime<Utc>) {
        if self.status != SessionStatus::Ended {
            self.status = SessionStatus::Ended;
            self.ended_at = Some(now);
        }
        self.phase = SessionPhase::Idle;
    }

    /// Replace the settings. Rejected once the session has ended.
    pub fn update_config(&mut self, config: SessionConfig) -> Result<(), LifecycleError> {
        if self.status == SessionStatus::Ended {
            return Err(LifecycleError {
                status: self.status,
                action: "reconfigure",
            });
        }
        self.config = config;
        Ok(())
    }
}
