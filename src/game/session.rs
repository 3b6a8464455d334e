//! Session phase state machine.
//!
//! A [`Session`] owns every piece of per-match state and applies player
//! actions synchronously. Each action validates first and mutates second,
//! so a rejected action leaves the session untouched. Accepted actions
//! return [`SessionEffect`]s describing what changed; the engine turns
//! those into durable writes, timers and events.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::GameConfig;
use crate::error::GameError;
use crate::game::cipher::{CipherState, CipherView};
use crate::game::meeting::MeetingCoordinator;
use crate::game::model::{
    MeetingId, MeetingMessage, MeetingReason, MeetingRecord, Outcome, Participant, Phase,
    PlayerId, Point, ProgressRecord, Role, RosterId, SessionId, Task, TaskId, Vote,
};
use crate::game::roles::assign_roles;
use crate::game::tasks::TaskTracker;
use crate::game::vote::{BallotBox, BallotOutcome, Tally};
use crate::game::win;

/// State change produced by an accepted action.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    TaskCompleted {
        task: Task,
        aggregate_progress: u32,
    },
    CipherChanged(CipherView),
    MeetingStarted(MeetingRecord),
    MessagePosted {
        meeting_id: MeetingId,
        message: MeetingMessage,
    },
    MeetingEnded(MeetingRecord),
    VotingStarted {
        round: u32,
    },
    VoteRecorded(Vote),
    VotingResolved {
        round: u32,
        tally: Tally,
    },
    PlayerEliminated {
        player_id: PlayerId,
        role: Role,
    },
    RoundStarted {
        round: u32,
    },
    GameEnded(Outcome),
}

impl SessionEffect {
    /// Effects whose durable write must not be lost: phase changes,
    /// eliminations and the final outcome.
    #[must_use]
    pub const fn is_critical(&self) -> bool {
        matches!(
            self,
            Self::MeetingStarted(_)
                | Self::VotingStarted { .. }
                | Self::PlayerEliminated { .. }
                | Self::RoundStarted { .. }
                | Self::GameEnded(_)
        )
    }
}

/// Result of an accepted task completion.
#[derive(Debug, Clone)]
pub struct TaskCompletion {
    pub task_id: TaskId,
    pub cipher: CipherView,
    pub aggregate_progress: u32,
    pub effects: Vec<SessionEffect>,
}

/// Durable projection of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub roster_id: RosterId,
    pub phase: Phase,
    pub round: u32,
    pub saboteur_ids: Vec<PlayerId>,
    pub participants: Vec<Participant>,
    pub secret: String,
    pub mask: String,
    pub decrypted_percentage: u32,
    pub winner: Option<Outcome>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Read-only view for callers; never exposes the secret.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub phase: Phase,
    pub round: u32,
    pub cipher: CipherView,
    pub aggregate_progress: u32,
    pub alive_players: Vec<PlayerId>,
    pub meeting: Option<MeetingRecord>,
    pub votes_cast: usize,
    pub outcome: Option<Outcome>,
}

/// One match.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    roster_id: RosterId,
    phase: Phase,
    round: u32,
    participants: IndexMap<PlayerId, Participant>,
    tracker: TaskTracker,
    cipher: CipherState,
    meetings: MeetingCoordinator,
    ballots: BallotBox,
    outcome: Option<Outcome>,
    config: Arc<GameConfig>,
    rng: StdRng,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Starts a session in `TASKS`, round 1: roles assigned, tasks
    /// generated, cipher fully masked.
    ///
    /// # Errors
    ///
    /// Returns `GameError::Validation` for a roster that cannot be
    /// partitioned or a config without secrets.
    pub fn create(
        id: SessionId,
        roster_id: RosterId,
        roster: &[PlayerId],
        config: Arc<GameConfig>,
        mut rng: StdRng,
    ) -> Result<Self, GameError> {
        let participants = assign_roles(roster, config.session.saboteur_count, &mut rng)?;
        let secret = config
            .cipher
            .secrets
            .choose(&mut rng)
            .ok_or_else(|| GameError::Validation("no cipher secrets configured".to_string()))?;
        let cipher = CipherState::new(secret, config.cipher.placeholder);
        let tracker = TaskTracker::generate(&id, &participants, &config.tasks);
        let meetings = MeetingCoordinator::new(&config.meeting);

        info!(
            session_id = %id,
            roster_id = %roster_id,
            players = participants.len(),
            tasks = tracker.len(),
            "session created"
        );

        Ok(Self {
            id,
            roster_id,
            phase: Phase::Tasks,
            round: 1,
            participants: participants
                .into_iter()
                .map(|p| (p.player_id.clone(), p))
                .collect(),
            tracker,
            cipher,
            meetings,
            ballots: BallotBox::new(),
            outcome: None,
            config,
            rng,
            created_at: Utc::now(),
        })
    }

    #[must_use]
    pub const fn id(&self) -> &SessionId {
        &self.id
    }

    #[must_use]
    pub const fn roster_id(&self) -> &RosterId {
        &self.roster_id
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    #[must_use]
    pub const fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    #[must_use]
    pub const fn cipher(&self) -> &CipherState {
        &self.cipher
    }

    #[must_use]
    pub const fn tasks(&self) -> &TaskTracker {
        &self.tracker
    }

    #[must_use]
    pub const fn meetings(&self) -> &MeetingCoordinator {
        &self.meetings
    }

    #[must_use]
    pub fn participant(&self, player: &PlayerId) -> Option<&Participant> {
        self.participants.get(player)
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    #[must_use]
    pub fn saboteur_ids(&self) -> Vec<PlayerId> {
        self.participants
            .values()
            .filter(|p| p.role == Role::Saboteur)
            .map(|p| p.player_id.clone())
            .collect()
    }

    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.participants.values().filter(|p| p.is_alive).count()
    }

    #[must_use]
    pub fn alive_majority(&self) -> usize {
        self.participants
            .values()
            .filter(|p| p.is_alive && p.role == Role::Majority)
            .count()
    }

    #[must_use]
    pub fn aggregate_progress(&self) -> u32 {
        self.tracker.aggregate_progress(self.alive_majority())
    }

    /// Ballots cast in the current vote.
    #[must_use]
    pub fn votes_cast(&self) -> usize {
        self.ballots.len()
    }

    /// Id of the running meeting, if any.
    #[must_use]
    pub fn current_meeting_id(&self) -> Option<&MeetingId> {
        self.meetings.current().map(|m| &m.id)
    }

    /// Records a task completion claimed by `player`.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown player or task
    /// - `AlreadyActed` if the task is already completed
    /// - `Unauthorized` if the task belongs to someone else or another faction
    /// - `InvalidPhase` outside `TASKS`
    /// - `Validation` if the reported position is too far from the task
    pub fn complete_task(
        &mut self,
        player: &PlayerId,
        task_id: &TaskId,
        position: Option<Point>,
        now: Instant,
    ) -> Result<TaskCompletion, GameError> {
        let claimant = self.require_participant(player)?;
        self.tracker.validate_claim(
            task_id,
            claimant,
            self.phase,
            position,
            self.config.tasks.proximity_threshold,
        )?;

        let Some(kind) = self.tracker.mark_completed(task_id, Utc::now()) else {
            return Err(GameError::AlreadyActed(format!(
                "task {task_id} is already completed"
            )));
        };
        let mut effects = Vec::new();
        let aggregate_progress = self.aggregate_progress();
        if let Some(task) = self.tracker.get(task_id) {
            effects.push(SessionEffect::TaskCompleted {
                task: task.clone(),
                aggregate_progress,
            });
        }
        debug!(
            session_id = %self.id,
            task_id = %task_id,
            kind = %kind,
            aggregate_progress,
            "task completed"
        );

        match kind {
            Role::Majority => {
                let alive_majority = self.alive_majority();
                if self.tracker.advance_wave(alive_majority) {
                    let change = self
                        .cipher
                        .conceal(self.config.cipher.conceal_step, &mut self.rng);
                    debug!(
                        session_id = %self.id,
                        concealed = change.concealed,
                        "concealment wave"
                    );
                    if !change.is_noop() {
                        effects.push(SessionEffect::CipherChanged(self.cipher.view()));
                    }
                }
            }
            Role::Saboteur => {
                self.cipher
                    .reveal(self.config.cipher.reveal_step, &mut self.rng);
                effects.push(SessionEffect::CipherChanged(self.cipher.view()));
                self.check_win(&mut effects);
            }
        }

        if !self.phase.is_terminal()
            && let Some(delta) = self.meetings.auto_trigger(self.tracker.majority_completed(), now)
        {
            self.open_meeting(
                MeetingReason::TaskThreshold {
                    completed_since_last: delta,
                },
                now,
                &mut effects,
            )?;
        }

        Ok(TaskCompletion {
            task_id: task_id.clone(),
            cipher: self.cipher.view(),
            aggregate_progress,
            effects,
        })
    }

    /// Forces a meeting on behalf of a living participant.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown player
    /// - `InvalidPhase` outside `TASKS`
    /// - `Unauthorized` if the caller is eliminated
    pub fn call_emergency(
        &mut self,
        caller: &PlayerId,
        now: Instant,
    ) -> Result<Vec<SessionEffect>, GameError> {
        let participant = self.require_participant(caller)?;
        self.require_phase("call_emergency", Phase::Tasks)?;
        if !participant.is_alive {
            return Err(GameError::Unauthorized(format!(
                "player {caller} is eliminated and cannot call a meeting"
            )));
        }

        let mut effects = Vec::new();
        self.open_meeting(
            MeetingReason::Emergency {
                caller: caller.clone(),
            },
            now,
            &mut effects,
        )?;
        Ok(effects)
    }

    /// Posts a chat line to the running meeting.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown player
    /// - `InvalidPhase` outside `MEETING`
    /// - `Unauthorized` if the player is eliminated
    /// - `Validation` for empty or over-long text
    /// - `AlreadyActed` if the player already spoke in this meeting
    pub fn send_message(
        &mut self,
        player: &PlayerId,
        text: &str,
    ) -> Result<Vec<SessionEffect>, GameError> {
        let participant = self.require_participant(player)?;
        self.require_phase("send_meeting_message", Phase::Meeting)?;
        if !participant.is_alive {
            return Err(GameError::Unauthorized(format!(
                "player {player} is eliminated and cannot speak"
            )));
        }

        let message = self
            .meetings
            .post(player, text, self.config.meeting.max_message_len)?
            .clone();
        let meeting_id = self
            .current_meeting_id()
            .cloned()
            .ok_or_else(|| GameError::NotFound("no meeting in progress".to_string()))?;
        Ok(vec![SessionEffect::MessagePosted {
            meeting_id,
            message,
        }])
    }

    /// Closes the running meeting and opens the vote.
    ///
    /// When `expected` is set, the call only applies to that meeting; a
    /// timer that fires after its meeting already ended gets `NotFound`.
    ///
    /// # Errors
    ///
    /// - `InvalidPhase` outside `MEETING`
    /// - `NotFound` if `expected` does not name the running meeting
    pub fn end_meeting(
        &mut self,
        expected: Option<&MeetingId>,
    ) -> Result<Vec<SessionEffect>, GameError> {
        self.require_phase("end_meeting", Phase::Meeting)?;
        if let Some(expected) = expected
            && self.current_meeting_id() != Some(expected)
        {
            return Err(GameError::NotFound(format!("meeting {expected}")));
        }

        let record = self
            .meetings
            .end()
            .ok_or_else(|| GameError::NotFound("no meeting in progress".to_string()))?;
        info!(
            session_id = %self.id,
            meeting_id = %record.id,
            messages = record.messages.len(),
            "meeting ended"
        );

        self.ballots.clear();
        self.enter(Phase::Voting);
        Ok(vec![
            SessionEffect::MeetingEnded(record),
            SessionEffect::VotingStarted { round: self.round },
        ])
    }

    /// Records a ballot; the last living voter's ballot triggers the tally.
    ///
    /// # Errors
    ///
    /// - `InvalidPhase` outside `VOTING`
    /// - `NotFound` for an unknown voter or target
    /// - `Unauthorized` if the voter is eliminated
    /// - `Validation` if the target is eliminated
    /// - `AlreadyActed` on a second ballot in the same round
    pub fn cast_vote(
        &mut self,
        voter: &PlayerId,
        target: Option<&PlayerId>,
    ) -> Result<Vec<SessionEffect>, GameError> {
        self.require_phase("cast_vote", Phase::Voting)?;
        let outcome = self.ballots.cast(&self.participants, voter, target)?;

        let mut effects = vec![SessionEffect::VoteRecorded(Vote {
            session_id: self.id.clone(),
            round: self.round,
            voter_id: voter.clone(),
            target_id: target.cloned(),
        })];

        match outcome {
            BallotOutcome::Recorded { cast, needed } => {
                debug!(session_id = %self.id, cast, needed, "vote recorded");
            }
            BallotOutcome::Resolved(tally) => self.resolve(tally, &mut effects),
        }
        Ok(effects)
    }

    /// Durable projection of the current state.
    #[must_use]
    pub fn record(&self) -> SessionRecord {
        SessionRecord {
            id: self.id.clone(),
            roster_id: self.roster_id.clone(),
            phase: self.phase,
            round: self.round,
            saboteur_ids: self.saboteur_ids(),
            participants: self.participants.values().cloned().collect(),
            secret: self.cipher.secret(),
            mask: self.cipher.mask(),
            decrypted_percentage: self.cipher.decrypted_percentage(),
            winner: self.outcome,
            created_at: self.created_at,
            updated_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            phase: self.phase,
            round: self.round,
            cipher: self.cipher.view(),
            aggregate_progress: self.aggregate_progress(),
            alive_players: self
                .participants
                .values()
                .filter(|p| p.is_alive)
                .map(|p| p.player_id.clone())
                .collect(),
            meeting: self.meetings.current().cloned(),
            votes_cast: self.ballots.len(),
            outcome: self.outcome,
        }
    }

    /// Progress projection for one player, derived from task records.
    ///
    /// # Errors
    ///
    /// Returns `GameError::NotFound` for an unknown player.
    pub fn progress(&self, player: &PlayerId) -> Result<ProgressRecord, GameError> {
        self.require_participant(player)?;
        Ok(self.tracker.progress_for(&self.id, player))
    }

    /// Progress projections for every participant.
    #[must_use]
    pub fn all_progress(&self) -> Vec<ProgressRecord> {
        self.participants
            .keys()
            .map(|p| self.tracker.progress_for(&self.id, p))
            .collect()
    }

    fn require_participant(&self, player: &PlayerId) -> Result<&Participant, GameError> {
        self.participants
            .get(player)
            .ok_or_else(|| GameError::NotFound(format!("player {player}")))
    }

    fn require_phase(&self, action: &'static str, required: Phase) -> Result<(), GameError> {
        if self.phase == required {
            Ok(())
        } else {
            Err(GameError::InvalidPhase {
                action,
                phase: self.phase,
            })
        }
    }

    fn enter(&mut self, next: Phase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal transition {} -> {next}",
            self.phase
        );
        info!(
            session_id = %self.id,
            from = %self.phase,
            to = %next,
            round = self.round,
            "phase transition"
        );
        self.phase = next;
    }

    fn open_meeting(
        &mut self,
        reason: MeetingReason,
        now: Instant,
        effects: &mut Vec<SessionEffect>,
    ) -> Result<(), GameError> {
        let record = self
            .meetings
            .start(
                &self.id,
                self.round,
                reason,
                self.tracker.majority_completed(),
                now,
            )?
            .clone();
        info!(
            session_id = %self.id,
            meeting_id = %record.id,
            reason = %record.reason,
            "meeting started"
        );
        self.enter(Phase::Meeting);
        effects.push(SessionEffect::MeetingStarted(record));
        Ok(())
    }

    fn resolve(&mut self, tally: Tally, effects: &mut Vec<SessionEffect>) {
        info!(
            session_id = %self.id,
            round = self.round,
            skip = tally.skip,
            eliminated = ?tally.eliminated,
            "votes tallied"
        );
        let eliminated = tally.eliminated.clone();
        effects.push(SessionEffect::VotingResolved {
            round: self.round,
            tally,
        });

        if let Some(player_id) = eliminated
            && let Some(participant) = self.participants.get_mut(&player_id)
        {
            participant.is_alive = false;
            info!(
                session_id = %self.id,
                player_id = %player_id,
                role = %participant.role,
                "player eliminated"
            );
            effects.push(SessionEffect::PlayerEliminated {
                player_id,
                role: participant.role,
            });
        }

        if self.check_win(effects) {
            return;
        }

        self.round += 1;
        self.enter(Phase::Tasks);
        effects.push(SessionEffect::RoundStarted { round: self.round });
    }

    /// Runs the win evaluator once; returns `true` if the game ended.
    fn check_win(&mut self, effects: &mut Vec<SessionEffect>) -> bool {
        if self.outcome.is_some() {
            return true;
        }
        let Some(outcome) = win::evaluate(
            self.cipher.decrypted_percentage(),
            self.participants.values(),
            self.config.session.survival_threshold,
        ) else {
            return false;
        };

        info!(
            session_id = %self.id,
            winner = %outcome.winner,
            reason = %outcome.reason,
            "game ended"
        );
        self.outcome = Some(outcome);
        self.ballots.clear();
        self.enter(Phase::Ended);
        effects.push(SessionEffect::GameEnded(outcome));
        true
    }
}
