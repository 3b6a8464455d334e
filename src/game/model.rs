//! Core data model shared by every game component.
//!
//! Identifiers are string newtypes so they can cross the persistence
//! and transport boundaries unchanged.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wraps a raw identifier.
            #[must_use]
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_id!(
    /// Identifies one match.
    SessionId
);
string_id!(
    /// Identifies the lobby roster a session was started from.
    RosterId
);
string_id!(
    /// Identifies a player across sessions.
    PlayerId
);
string_id!(
    /// Identifies one task instance; stable per player (`<player>/<catalog key>`).
    TaskId
);
string_id!(
    /// Identifies one meeting within a session.
    MeetingId
);

impl TaskId {
    /// Builds the stable per-player task id for a catalog entry.
    #[must_use]
    pub fn for_player(player: &PlayerId, catalog_key: &str) -> Self {
        Self(format!("{player}/{catalog_key}"))
    }
}

/// Session phase.
///
/// `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Players roam and complete tasks
    Tasks,
    /// Discussion window; one chat message per player
    Meeting,
    /// Every living player casts one vote
    Voting,
    /// A faction has won
    Ended,
}

impl Phase {
    /// Returns whether the state machine allows moving from `self` to `next`.
    ///
    /// `TASKS → MEETING → VOTING → TASKS`, and any live phase may end.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Tasks, Self::Meeting)
                | (Self::Meeting, Self::Voting)
                | (Self::Voting, Self::Tasks)
                | (Self::Tasks | Self::Meeting | Self::Voting, Self::Ended)
        )
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ended)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Tasks => "TASKS",
            Self::Meeting => "MEETING",
            Self::Voting => "VOTING",
            Self::Ended => "ENDED",
        };
        f.write_str(s)
    }
}

/// Faction membership. Also used as the kind of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Cooperative majority
    Majority,
    /// Hidden minority
    Saboteur,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Majority => f.write_str("MAJORITY"),
            Self::Saboteur => f.write_str("SABOTEUR"),
        }
    }
}

/// Kind of a task; matches the role allowed to complete it.
pub type TaskKind = Role;

/// A roster member within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub player_id: PlayerId,
    pub role: Role,
    pub is_alive: bool,
}

/// A position on the map.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// One task instance owned by a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub session_id: SessionId,
    pub owner_player_id: PlayerId,
    pub kind: TaskKind,
    pub catalog_key: String,
    pub name: String,
    pub location: Point,
    pub points: u32,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Why a meeting was started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MeetingReason {
    /// Enough majority tasks completed since the last meeting
    TaskThreshold {
        /// Completions counted since the previous meeting
        completed_since_last: u64,
    },
    /// A living player called an emergency meeting
    Emergency {
        /// Player who made the call
        caller: PlayerId,
    },
}

impl fmt::Display for MeetingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TaskThreshold { .. } => f.write_str("task_threshold"),
            Self::Emergency { .. } => f.write_str("emergency"),
        }
    }
}

/// A chat line posted during a meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingMessage {
    pub player_id: PlayerId,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// A discussion sub-phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingRecord {
    pub id: MeetingId,
    pub session_id: SessionId,
    pub round: u32,
    pub reason: MeetingReason,
    pub messages: Vec<MeetingMessage>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl MeetingRecord {
    /// Returns whether `player` already posted in this meeting.
    #[must_use]
    pub fn has_spoken(&self, player: &PlayerId) -> bool {
        self.messages.iter().any(|m| &m.player_id == player)
    }
}

/// A ballot. `target_id == None` is a skip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub session_id: SessionId,
    pub round: u32,
    pub voter_id: PlayerId,
    pub target_id: Option<PlayerId>,
}

/// Per-player progress projection. Not authoritative; rebuildable from tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub tasks_completed_count: u32,
    pub total_points: u32,
    pub last_updated: DateTime<Utc>,
}

/// Why a faction won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinReason {
    /// The cipher reached 100%
    DecryptionComplete,
    /// Every saboteur was voted out
    SaboteurEliminated,
    /// Too few players remain to out-vote the saboteurs
    Survival,
}

impl fmt::Display for WinReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DecryptionComplete => "decryption complete",
            Self::SaboteurEliminated => "saboteur eliminated",
            Self::Survival => "survival",
        };
        f.write_str(s)
    }
}

/// Terminal result of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub winner: Role,
    pub reason: WinReason,
}
