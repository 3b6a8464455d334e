//! Game event stream.
//!
//! [`GameEvent`] is what the engine publishes on its broadcast channel
//! for transports to fan out. [`EventEmitter`] writes the same events as
//! newline-delimited JSON with a monotonically increasing sequence number.

use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::model::{MeetingId, MeetingReason, PlayerId, Role, SessionId, TaskId, WinReason};
use crate::game::session::SessionEffect;

/// A discrete event emitted by the engine.
///
/// Serialized with a dotted `"type"` tag (`task.updated`, `game.ended`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GameEvent {
    #[serde(rename = "session.created")]
    SessionCreated {
        timestamp: DateTime<Utc>,
        session_id: SessionId,
        players: usize,
    },

    /// A task was completed.
    #[serde(rename = "task.updated")]
    TaskUpdated {
        timestamp: DateTime<Utc>,
        session_id: SessionId,
        task_id: TaskId,
        player_id: PlayerId,
        completed: bool,
        /// Majority progress after this completion, 0..=100
        aggregate_progress: u32,
    },

    /// The visible mask changed.
    #[serde(rename = "cipher.updated")]
    CipherUpdated {
        timestamp: DateTime<Utc>,
        session_id: SessionId,
        mask: String,
        decrypted_percentage: u32,
    },

    #[serde(rename = "meeting.started")]
    MeetingStarted {
        timestamp: DateTime<Utc>,
        session_id: SessionId,
        meeting_id: MeetingId,
        round: u32,
        reason: MeetingReason,
    },

    #[serde(rename = "meeting.message")]
    MeetingMessage {
        timestamp: DateTime<Utc>,
        session_id: SessionId,
        meeting_id: MeetingId,
        player_id: PlayerId,
        text: String,
    },

    #[serde(rename = "meeting.ended")]
    MeetingEnded {
        timestamp: DateTime<Utc>,
        session_id: SessionId,
        meeting_id: MeetingId,
    },

    #[serde(rename = "voting.started")]
    VotingStarted {
        timestamp: DateTime<Utc>,
        session_id: SessionId,
        round: u32,
    },

    /// Votes were tallied.
    #[serde(rename = "voting.resolved")]
    VotingResolved {
        timestamp: DateTime<Utc>,
        session_id: SessionId,
        round: u32,
        /// `null` when nobody was voted out
        eliminated_player_id: Option<PlayerId>,
        breakdown: BTreeMap<PlayerId, u32>,
        skip: u32,
    },

    #[serde(rename = "game.ended")]
    GameEnded {
        timestamp: DateTime<Utc>,
        session_id: SessionId,
        winner: Role,
        reason: WinReason,
    },

    /// A critical write failed for good; the session is frozen.
    #[serde(rename = "session.faulted")]
    SessionFaulted {
        timestamp: DateTime<Utc>,
        session_id: SessionId,
        reason: String,
    },

    #[serde(rename = "session.archived")]
    SessionArchived {
        timestamp: DateTime<Utc>,
        session_id: SessionId,
    },
}

impl GameEvent {
    /// Maps a session effect to its public event, if it has one.
    ///
    /// Votes and eliminations stay private until the tally is published.
    #[must_use]
    pub fn from_effect(session_id: &SessionId, effect: &SessionEffect) -> Option<Self> {
        let timestamp = Utc::now();
        let session_id = session_id.clone();
        let event = match effect {
            SessionEffect::TaskCompleted {
                task,
                aggregate_progress,
            } => Self::TaskUpdated {
                timestamp,
                session_id,
                task_id: task.id.clone(),
                player_id: task.owner_player_id.clone(),
                completed: task.completed,
                aggregate_progress: *aggregate_progress,
            },
            SessionEffect::CipherChanged(view) => Self::CipherUpdated {
                timestamp,
                session_id,
                mask: view.mask.clone(),
                decrypted_percentage: view.decrypted_percentage,
            },
            SessionEffect::MeetingStarted(record) => Self::MeetingStarted {
                timestamp,
                session_id,
                meeting_id: record.id.clone(),
                round: record.round,
                reason: record.reason.clone(),
            },
            SessionEffect::MessagePosted {
                meeting_id,
                message,
            } => Self::MeetingMessage {
                timestamp,
                session_id,
                meeting_id: meeting_id.clone(),
                player_id: message.player_id.clone(),
                text: message.text.clone(),
            },
            SessionEffect::MeetingEnded(record) => Self::MeetingEnded {
                timestamp,
                session_id,
                meeting_id: record.id.clone(),
            },
            SessionEffect::VotingStarted { round } => Self::VotingStarted {
                timestamp,
                session_id,
                round: *round,
            },
            SessionEffect::VotingResolved { round, tally } => Self::VotingResolved {
                timestamp,
                session_id,
                round: *round,
                eliminated_player_id: tally.eliminated.clone(),
                breakdown: tally.breakdown.clone(),
                skip: tally.skip,
            },
            SessionEffect::GameEnded(outcome) => Self::GameEnded {
                timestamp,
                session_id,
                winner: outcome.winner,
                reason: outcome.reason,
            },
            SessionEffect::VoteRecorded(_)
            | SessionEffect::PlayerEliminated { .. }
            | SessionEffect::RoundStarted { .. } => return None,
        };
        Some(event)
    }

    /// Dotted event name, as written in the `"type"` field.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SessionCreated { .. } => "session.created",
            Self::TaskUpdated { .. } => "task.updated",
            Self::CipherUpdated { .. } => "cipher.updated",
            Self::MeetingStarted { .. } => "meeting.started",
            Self::MeetingMessage { .. } => "meeting.message",
            Self::MeetingEnded { .. } => "meeting.ended",
            Self::VotingStarted { .. } => "voting.started",
            Self::VotingResolved { .. } => "voting.resolved",
            Self::GameEnded { .. } => "game.ended",
            Self::SessionFaulted { .. } => "session.faulted",
            Self::SessionArchived { .. } => "session.archived",
        }
    }

    #[must_use]
    pub const fn session_id(&self) -> &SessionId {
        match self {
            Self::SessionCreated { session_id, .. }
            | Self::TaskUpdated { session_id, .. }
            | Self::CipherUpdated { session_id, .. }
            | Self::MeetingStarted { session_id, .. }
            | Self::MeetingMessage { session_id, .. }
            | Self::MeetingEnded { session_id, .. }
            | Self::VotingStarted { session_id, .. }
            | Self::VotingResolved { session_id, .. }
            | Self::GameEnded { session_id, .. }
            | Self::SessionFaulted { session_id, .. }
            | Self::SessionArchived { session_id, .. } => session_id,
        }
    }
}

/// Wraps a [`GameEvent`] with its sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope<'a> {
    sequence: u64,
    #[serde(flatten)]
    event: &'a GameEvent,
}

/// Thread-safe, buffered JSONL event writer.
///
/// Serialization or I/O failures are dropped; a broken event sink never
/// stops a game.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Discards everything.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Writes one event as a single JSON line.
    pub fn emit(&self, event: &GameEvent) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope { sequence, event };

        if let Ok(mut w) = self.writer.lock()
            && let Ok(line) = serde_json::to_string(&envelope)
        {
            let _ = writeln!(w, "{line}");
            let _ = w.flush();
        }
    }

    /// Number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}
