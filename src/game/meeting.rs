//! Meeting coordination.
//!
//! Decides when a meeting starts (task threshold with cooldown, or an
//! emergency call), keeps the record of the meeting in progress, and
//! enforces one chat message per player per meeting.

use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use crate::config::schema::MeetingSettings;
use crate::error::GameError;
use crate::game::model::{
    MeetingId, MeetingMessage, MeetingReason, MeetingRecord, PlayerId, SessionId,
};

/// Meeting trigger state and records for one session.
#[derive(Debug, Clone)]
pub struct MeetingCoordinator {
    task_threshold: u64,
    cooldown: Duration,
    tasks_at_last_meeting: u64,
    last_meeting_time: Option<Instant>,
    current: Option<MeetingRecord>,
    history: Vec<MeetingRecord>,
    sequence: u32,
}

impl MeetingCoordinator {
    #[must_use]
    pub const fn new(settings: &MeetingSettings) -> Self {
        Self {
            task_threshold: settings.task_threshold,
            cooldown: settings.cooldown,
            tasks_at_last_meeting: 0,
            last_meeting_time: None,
            current: None,
            history: Vec::new(),
            sequence: 0,
        }
    }

    #[must_use]
    pub const fn in_progress(&self) -> bool {
        self.current.is_some()
    }

    #[must_use]
    pub const fn current(&self) -> Option<&MeetingRecord> {
        self.current.as_ref()
    }

    /// Meetings that already ended, oldest first.
    #[must_use]
    pub fn history(&self) -> &[MeetingRecord] {
        &self.history
    }

    #[must_use]
    pub const fn tasks_at_last_meeting(&self) -> u64 {
        self.tasks_at_last_meeting
    }

    /// Evaluates the automatic trigger after a task completion.
    ///
    /// Returns the number of completions since the last meeting when the
    /// threshold is met, no meeting is running, and the cooldown elapsed.
    /// A session that never had a meeting counts as cooled down.
    #[must_use]
    pub fn auto_trigger(&self, majority_completed: u64, now: Instant) -> Option<u64> {
        if self.in_progress() {
            return None;
        }
        let delta = majority_completed.saturating_sub(self.tasks_at_last_meeting);
        if delta < self.task_threshold {
            return None;
        }
        let cooled_down = self
            .last_meeting_time
            .is_none_or(|last| now.saturating_duration_since(last) >= self.cooldown);
        cooled_down.then_some(delta)
    }

    /// Opens a meeting and resets the trigger counters.
    ///
    /// # Errors
    ///
    /// Returns `GameError::AlreadyActed` if a meeting is already running.
    pub fn start(
        &mut self,
        session_id: &SessionId,
        round: u32,
        reason: MeetingReason,
        majority_completed: u64,
        now: Instant,
    ) -> Result<&MeetingRecord, GameError> {
        if self.in_progress() {
            return Err(GameError::AlreadyActed(
                "a meeting is already in progress".to_string(),
            ));
        }
        self.sequence += 1;
        self.tasks_at_last_meeting = majority_completed;
        self.last_meeting_time = Some(now);

        let record = MeetingRecord {
            id: MeetingId::new(format!("{session_id}-m{}", self.sequence)),
            session_id: session_id.clone(),
            round,
            reason,
            messages: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        };
        Ok(self.current.insert(record))
    }

    /// Closes the running meeting and returns its final record.
    pub fn end(&mut self) -> Option<MeetingRecord> {
        let mut record = self.current.take()?;
        record.ended_at = Some(Utc::now());
        self.history.push(record.clone());
        Some(record)
    }

    /// Posts a chat message to the running meeting.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no meeting is running
    /// - `Validation` for empty or over-long text
    /// - `AlreadyActed` if the player already spoke in this meeting
    pub fn post(
        &mut self,
        player: &PlayerId,
        text: &str,
        max_len: usize,
    ) -> Result<&MeetingMessage, GameError> {
        let record = self
            .current
            .as_mut()
            .ok_or_else(|| GameError::NotFound("no meeting in progress".to_string()))?;

        let text = text.trim();
        if text.is_empty() {
            return Err(GameError::Validation("message cannot be empty".to_string()));
        }
        let len = text.chars().count();
        if len > max_len {
            return Err(GameError::Validation(format!(
                "message is {len} characters, limit is {max_len}"
            )));
        }
        if record.has_spoken(player) {
            return Err(GameError::AlreadyActed(format!(
                "player {player} already spoke in meeting {}",
                record.id
            )));
        }

        record.messages.push(MeetingMessage {
            player_id: player.clone(),
            text: text.to_owned(),
            sent_at: Utc::now(),
        });
        Ok(&record.messages[record.messages.len() - 1])
    }
}
