//! Session engine.
//!
//! [`GameEngine`] owns the registry of live sessions. Every mutation of a
//! session runs under that session's async mutex: the rules are applied
//! in memory, the durable mirror is written, timers are adjusted and
//! events are published, all before the lock is released. Sessions never
//! share a lock.
//!
//! Meeting auto-end timers are per-session tasks. When one fires it sends
//! the expiry over a channel to the engine's driver task, which ends the
//! meeting through the same locked path as an explicit call. A timer that
//! fires after its meeting already ended is ignored.

mod actions;
pub mod mirror;

pub use actions::{Action, ActionReply};
pub use mirror::{DurableMirror, DurableWrite, RetryPolicy};

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::GameConfig;
use crate::error::{EngineError, GameError, PersistenceError};
use crate::game::cipher::CipherView;
use crate::game::model::{
    MeetingId, Phase, PlayerId, Point, ProgressRecord, RosterId, SessionId, Task, TaskId,
};
use crate::game::session::{Session, SessionEffect, SessionSnapshot};
use crate::game::vote::Tally;
use crate::observability::GameEvent;
use crate::observability::metrics;
use crate::ports::{
    IdentityResolver, InMemoryRoster, InMemoryStore, PersistenceGateway, RosterProvider,
    StaticIdentity,
};

/// Default capacity of the event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Session ids drawn before `create_session` gives up on finding a free one.
const MAX_ID_DRAWS: u32 = 8;

/// Accepted task completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReceipt {
    pub task_id: TaskId,
    pub cipher: CipherView,
    pub aggregate_progress: u32,
    /// Phase after the completion; `MEETING` if it triggered one
    pub phase: Phase,
}

/// Accepted ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteReceipt {
    /// Set when this ballot completed the round
    pub tally: Option<Tally>,
    pub phase: Phase,
}

struct SessionSlot {
    session: Session,
    meeting_timer: Option<CancellationToken>,
    faulted: bool,
    archived: bool,
}

impl SessionSlot {
    const fn new(session: Session) -> Self {
        Self {
            session,
            meeting_timer: None,
            faulted: false,
            archived: false,
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.meeting_timer.take() {
            timer.cancel();
        }
    }
}

#[derive(Debug)]
struct MeetingExpiry {
    session_id: SessionId,
    meeting_id: MeetingId,
}

struct EngineInner {
    config: Arc<GameConfig>,
    sessions: DashMap<SessionId, Arc<Mutex<SessionSlot>>>,
    roster: Arc<dyn RosterProvider>,
    identity: Arc<dyn IdentityResolver>,
    mirror: DurableMirror,
    events: broadcast::Sender<GameEvent>,
    rng: StdMutex<StdRng>,
    expiries: mpsc::UnboundedSender<MeetingExpiry>,
    shutdown: CancellationToken,
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Builder for [`GameEngine`]. Collaborators default to the in-memory ones.
pub struct EngineBuilder {
    config: Arc<GameConfig>,
    roster: Option<Arc<dyn RosterProvider>>,
    store: Option<Arc<dyn PersistenceGateway>>,
    identity: Option<Arc<dyn IdentityResolver>>,
    seed: Option<u64>,
    event_capacity: usize,
}

impl EngineBuilder {
    #[must_use]
    pub fn roster(mut self, roster: Arc<dyn RosterProvider>) -> Self {
        self.roster = Some(roster);
        self
    }

    #[must_use]
    pub fn store(mut self, store: Arc<dyn PersistenceGateway>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn identity(mut self, identity: Arc<dyn IdentityResolver>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Seeds every random choice the engine makes (ids, roles, secrets,
    /// masks). The same seed and the same action sequence replay the same
    /// match.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub const fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Builds the engine and starts its timer driver.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn build(self) -> GameEngine {
        let rng = self
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        let policy = RetryPolicy::from(&self.config.persistence);
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryStore::new()));
        let (events, _) = broadcast::channel(self.event_capacity.max(1));
        let (expiries, rx) = mpsc::unbounded_channel();

        let inner = Arc::new(EngineInner {
            config: self.config,
            sessions: DashMap::new(),
            roster: self
                .roster
                .unwrap_or_else(|| Arc::new(InMemoryRoster::new())),
            identity: self
                .identity
                .unwrap_or_else(|| Arc::new(StaticIdentity::new())),
            mirror: DurableMirror::new(store, policy),
            events,
            rng: StdMutex::new(rng),
            expiries,
            shutdown: CancellationToken::new(),
        });

        spawn_timer_driver(&inner, rx);
        GameEngine { inner }
    }
}

/// Receives meeting expiries and ends each meeting on its own task.
///
/// Holds only a weak reference so dropping the last engine handle stops it.
fn spawn_timer_driver(inner: &Arc<EngineInner>, mut rx: mpsc::UnboundedReceiver<MeetingExpiry>) {
    let weak = Arc::downgrade(inner);
    let shutdown = inner.shutdown.clone();
    tokio::spawn(async move {
        loop {
            let expiry = tokio::select! {
                () = shutdown.cancelled() => break,
                msg = rx.recv() => match msg {
                    Some(expiry) => expiry,
                    None => break,
                },
            };
            let Some(inner) = weak.upgrade() else {
                break;
            };
            let engine = GameEngine { inner };
            tokio::spawn(async move {
                engine.expire_meeting(expiry).await;
            });
        }
        debug!("meeting timer driver stopped");
    });
}

/// Handle to the session engine. Cheap to clone.
#[derive(Clone)]
pub struct GameEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for GameEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameEngine")
            .field("sessions", &self.inner.sessions.len())
            .field("mirror", &self.inner.mirror)
            .finish_non_exhaustive()
    }
}

impl GameEngine {
    #[must_use]
    pub fn builder(config: Arc<GameConfig>) -> EngineBuilder {
        EngineBuilder {
            config,
            roster: None,
            store: None,
            identity: None,
            seed: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Arc<GameConfig> {
        &self.inner.config
    }

    /// Receives every event published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.inner.events.subscribe()
    }

    /// Sessions currently held in memory.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    #[must_use]
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.inner.sessions.iter().map(|e| e.key().clone()).collect()
    }

    /// Cancels every meeting timer and stops the timer driver.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    /// Starts a session from a lobby roster.
    ///
    /// # Errors
    ///
    /// - `Roster` if the roster cannot be read
    /// - `Game(Validation)` if the roster cannot start a game
    /// - `Persistence` if the store cannot be read or the initial
    ///   snapshot cannot be stored
    pub async fn create_session(&self, roster_id: &RosterId) -> Result<SessionSnapshot, EngineError> {
        let result = self.create_inner(roster_id).await;
        metrics::record_action("create_session", &result);
        result
    }

    async fn create_inner(&self, roster_id: &RosterId) -> Result<SessionSnapshot, EngineError> {
        let players = self.inner.roster.get_roster(roster_id).await?;
        let (session_id, rng) = self.claim_session().await?;
        let session = Session::create(
            session_id.clone(),
            roster_id.clone(),
            &players,
            Arc::clone(&self.inner.config),
            rng,
        )?;

        let record = session.record();
        self.inner
            .mirror
            .critical(DurableWrite::Session(&record))
            .await
            .map_err(|source| EngineError::Persistence {
                session_id: session_id.clone(),
                source,
            })?;
        let tasks: Vec<Task> = session.tasks().tasks().cloned().collect();
        self.inner.mirror.best_effort(DurableWrite::Tasks(&tasks)).await;

        for participant in session.participants() {
            if let Err(err) = self
                .inner
                .roster
                .set_role(roster_id, &participant.player_id, participant.role)
                .await
            {
                warn!(
                    session_id = %session_id,
                    player_id = %participant.player_id,
                    error = %err,
                    "failed to publish role to roster"
                );
            }
        }

        let snapshot = session.snapshot();
        let players = snapshot.alive_players.len();
        self.inner
            .sessions
            .insert(session_id.clone(), Arc::new(Mutex::new(SessionSlot::new(session))));
        metrics::record_session_created();
        metrics::set_sessions_active(self.inner.sessions.len());
        self.publish(GameEvent::SessionCreated {
            timestamp: chrono::Utc::now(),
            session_id,
            players,
        });
        Ok(snapshot)
    }

    /// Records a task completion.
    ///
    /// # Errors
    ///
    /// Rule rejections come back as `EngineError::Game`; see
    /// [`Session::complete_task`].
    pub async fn complete_task(
        &self,
        session_id: &SessionId,
        player_id: &PlayerId,
        task_id: &TaskId,
        position: Option<Point>,
    ) -> Result<TaskReceipt, EngineError> {
        self.run(session_id, "complete_task", |session, now| {
            let done = session.complete_task(player_id, task_id, position, now)?;
            let receipt = TaskReceipt {
                task_id: done.task_id,
                cipher: done.cipher,
                aggregate_progress: done.aggregate_progress,
                phase: session.phase(),
            };
            Ok((receipt, done.effects))
        })
        .await
    }

    /// Calls an emergency meeting; returns its id.
    ///
    /// # Errors
    ///
    /// See [`Session::call_emergency`].
    pub async fn call_emergency(
        &self,
        session_id: &SessionId,
        caller: &PlayerId,
    ) -> Result<MeetingId, EngineError> {
        self.run(session_id, "call_emergency", |session, now| {
            let effects = session.call_emergency(caller, now)?;
            let meeting_id = session
                .current_meeting_id()
                .cloned()
                .ok_or_else(|| GameError::NotFound("meeting".to_string()))?;
            Ok((meeting_id, effects))
        })
        .await
    }

    /// Posts a chat message to the running meeting.
    ///
    /// # Errors
    ///
    /// See [`Session::send_message`].
    pub async fn send_meeting_message(
        &self,
        session_id: &SessionId,
        player_id: &PlayerId,
        text: &str,
    ) -> Result<(), EngineError> {
        self.run(session_id, "send_meeting_message", |session, _| {
            Ok(((), session.send_message(player_id, text)?))
        })
        .await
    }

    /// Ends the running meeting before its timer and opens the vote.
    ///
    /// # Errors
    ///
    /// `InvalidPhase` outside `MEETING`.
    pub async fn end_meeting(&self, session_id: &SessionId) -> Result<(), EngineError> {
        self.run(session_id, "end_meeting", |session, _| {
            Ok(((), session.end_meeting(None)?))
        })
        .await
    }

    /// Casts a ballot. `target == None` is a skip.
    ///
    /// # Errors
    ///
    /// See [`Session::cast_vote`].
    pub async fn cast_vote(
        &self,
        session_id: &SessionId,
        voter: &PlayerId,
        target: Option<&PlayerId>,
    ) -> Result<VoteReceipt, EngineError> {
        self.run(session_id, "cast_vote", |session, _| {
            let effects = session.cast_vote(voter, target)?;
            let tally = effects.iter().find_map(|e| match e {
                SessionEffect::VotingResolved { tally, .. } => Some(tally.clone()),
                _ => None,
            });
            let receipt = VoteReceipt {
                tally,
                phase: session.phase(),
            };
            Ok((receipt, effects))
        })
        .await
    }

    /// Read-only view of a session.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown session.
    pub async fn snapshot(&self, session_id: &SessionId) -> Result<SessionSnapshot, EngineError> {
        let slot = self.slot(session_id)?;
        let guard = slot.lock().await;
        Ok(guard.session.snapshot())
    }

    /// Progress projection for one player.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown session or player.
    pub async fn progress(
        &self,
        session_id: &SessionId,
        player_id: &PlayerId,
    ) -> Result<ProgressRecord, EngineError> {
        let slot = self.slot(session_id)?;
        let guard = slot.lock().await;
        Ok(guard.session.progress(player_id)?)
    }

    /// Re-derives every player's progress from task records and writes
    /// the projections to the store.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown session.
    pub async fn rebuild_progress(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<ProgressRecord>, EngineError> {
        let slot = self.slot(session_id)?;
        let guard = slot.lock().await;
        let records = guard.session.all_progress();
        if !guard.faulted {
            for record in &records {
                self.inner
                    .mirror
                    .best_effort(DurableWrite::Progress(record))
                    .await;
            }
        }
        info!(session_id = %session_id, players = records.len(), "progress rebuilt");
        Ok(records)
    }

    /// Persists the final state, archives the session in the store, cancels
    /// its timer and evicts it from memory.
    ///
    /// A faulted session is evicted even if the store is still failing.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown session
    /// - `Persistence` if the archive write fails; the session stays loaded
    pub async fn archive_session(&self, session_id: &SessionId) -> Result<(), EngineError> {
        let slot = self.slot(session_id)?;
        let mut guard = slot.lock().await;
        if guard.archived {
            return Err(not_found(session_id).into());
        }

        let record = guard.session.record();
        let mirror = &self.inner.mirror;
        if guard.faulted {
            mirror.best_effort(DurableWrite::Session(&record)).await;
            mirror.best_effort(DurableWrite::Archive(session_id)).await;
        } else {
            let persisted = match mirror.critical(DurableWrite::Session(&record)).await {
                Ok(()) => mirror.critical(DurableWrite::Archive(session_id)).await,
                Err(err) => Err(err),
            };
            persisted.map_err(|source| EngineError::Persistence {
                session_id: session_id.clone(),
                source,
            })?;
        }

        guard.cancel_timer();
        guard.archived = true;
        let phase = guard.session.phase();
        drop(guard);

        self.inner.sessions.remove(session_id);
        metrics::set_sessions_active(self.inner.sessions.len());
        info!(session_id = %session_id, phase = %phase, "session archived");
        self.publish(GameEvent::SessionArchived {
            timestamp: chrono::Utc::now(),
            session_id: session_id.clone(),
        });
        Ok(())
    }

    /// Resolves the caller token and routes one player action.
    ///
    /// # Errors
    ///
    /// `Identity` for an unknown token; otherwise as the routed action.
    pub async fn dispatch(
        &self,
        session_id: &SessionId,
        token: &str,
        action: Action,
    ) -> Result<ActionReply, EngineError> {
        let player = self.inner.identity.resolve(token).await?;
        actions::route(self, session_id, &player, action).await
    }

    async fn expire_meeting(&self, expiry: MeetingExpiry) {
        let result = self
            .run(&expiry.session_id, "meeting_timeout", |session, _| {
                Ok(((), session.end_meeting(Some(&expiry.meeting_id))?))
            })
            .await;
        match result {
            Ok(()) => info!(
                session_id = %expiry.session_id,
                meeting_id = %expiry.meeting_id,
                "meeting ended by timer"
            ),
            Err(EngineError::Game(err)) => debug!(
                session_id = %expiry.session_id,
                meeting_id = %expiry.meeting_id,
                error = %err,
                "stale meeting timer ignored"
            ),
            Err(err) => warn!(
                session_id = %expiry.session_id,
                meeting_id = %expiry.meeting_id,
                error = %err,
                "meeting timer could not end meeting"
            ),
        }
    }

    /// Applies one action under the session lock and commits its effects.
    async fn run<R, F>(
        &self,
        session_id: &SessionId,
        action: &'static str,
        apply: F,
    ) -> Result<R, EngineError>
    where
        R: Send,
        F: FnOnce(&mut Session, Instant) -> Result<(R, Vec<SessionEffect>), GameError> + Send,
    {
        let result = self.run_locked(session_id, apply).await;
        metrics::record_action(action, &result);
        if let Err(EngineError::Game(err)) = &result {
            debug!(
                session_id = %session_id,
                action,
                code = err.code(),
                error = %err,
                "action rejected"
            );
        }
        result
    }

    async fn run_locked<R, F>(&self, session_id: &SessionId, apply: F) -> Result<R, EngineError>
    where
        R: Send,
        F: FnOnce(&mut Session, Instant) -> Result<(R, Vec<SessionEffect>), GameError> + Send,
    {
        let slot = self.slot(session_id)?;
        let mut guard = slot.lock().await;
        if guard.archived {
            return Err(not_found(session_id).into());
        }
        if guard.faulted {
            return Err(EngineError::SessionFaulted(session_id.clone()));
        }

        let (value, effects) = apply(&mut guard.session, Instant::now())?;
        self.commit(&mut guard, effects).await?;
        Ok(value)
    }

    /// Writes the mirror, adjusts timers and publishes events for `effects`.
    async fn commit(
        &self,
        slot: &mut SessionSlot,
        effects: Vec<SessionEffect>,
    ) -> Result<(), EngineError> {
        if effects.is_empty() {
            return Ok(());
        }
        let session_id = slot.session.id().clone();
        let roster_id = slot.session.roster_id().clone();
        let mirror = &self.inner.mirror;

        let mut critical = false;
        let mut cipher_changed = false;
        for effect in &effects {
            critical |= effect.is_critical();
            match effect {
                SessionEffect::TaskCompleted { task, .. } => {
                    mirror.best_effort(DurableWrite::Task(task)).await;
                    if let Ok(progress) = slot.session.progress(&task.owner_player_id) {
                        mirror.best_effort(DurableWrite::Progress(&progress)).await;
                    }
                }
                SessionEffect::CipherChanged(_) => cipher_changed = true,
                SessionEffect::MeetingStarted(record) => {
                    metrics::record_meeting(&record.reason);
                    metrics::record_phase(Phase::Meeting);
                    mirror.best_effort(DurableWrite::Meeting(record)).await;
                    self.schedule_meeting_end(slot, record.id.clone());
                }
                SessionEffect::MessagePosted { .. } => {
                    if let Some(record) = slot.session.meetings().current() {
                        mirror.best_effort(DurableWrite::Meeting(record)).await;
                    }
                }
                SessionEffect::MeetingEnded(record) => {
                    slot.cancel_timer();
                    mirror.best_effort(DurableWrite::Meeting(record)).await;
                }
                SessionEffect::VotingStarted { .. } => metrics::record_phase(Phase::Voting),
                SessionEffect::VoteRecorded(vote) => {
                    mirror.best_effort(DurableWrite::Vote(vote)).await;
                }
                SessionEffect::VotingResolved { round, tally } => {
                    metrics::record_tally(tally.eliminated.is_some());
                    mirror
                        .best_effort(DurableWrite::ClearVotes {
                            session_id: &session_id,
                            round: *round,
                        })
                        .await;
                }
                SessionEffect::PlayerEliminated { player_id, .. } => {
                    if let Err(err) = self
                        .inner
                        .roster
                        .set_alive(&roster_id, player_id, false)
                        .await
                    {
                        warn!(
                            session_id = %session_id,
                            player_id = %player_id,
                            error = %err,
                            "failed to publish elimination to roster"
                        );
                    }
                }
                SessionEffect::RoundStarted { .. } => metrics::record_phase(Phase::Tasks),
                SessionEffect::GameEnded(outcome) => {
                    slot.cancel_timer();
                    metrics::record_phase(Phase::Ended);
                    metrics::record_game_ended(*outcome);
                }
            }
        }

        let record = slot.session.record();
        if critical {
            if let Err(source) = mirror.critical(DurableWrite::Session(&record)).await {
                self.fault(slot, &source);
                return Err(EngineError::Persistence { session_id, source });
            }
        } else if cipher_changed {
            mirror.best_effort(DurableWrite::Session(&record)).await;
        }

        for effect in &effects {
            if let Some(event) = GameEvent::from_effect(&session_id, effect) {
                self.publish(event);
            }
        }
        Ok(())
    }

    fn schedule_meeting_end(&self, slot: &mut SessionSlot, meeting_id: MeetingId) {
        slot.cancel_timer();
        let token = self.inner.shutdown.child_token();
        let cancel = token.clone();
        let duration = self.inner.config.meeting.duration;
        let expiries = self.inner.expiries.clone();
        let session_id = slot.session.id().clone();
        debug!(
            session_id = %session_id,
            meeting_id = %meeting_id,
            after = ?duration,
            "meeting timer armed"
        );
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(duration) => {
                    let _ = expiries.send(MeetingExpiry { session_id, meeting_id });
                }
            }
        });
        slot.meeting_timer = Some(token);
    }

    fn fault(&self, slot: &mut SessionSlot, source: &PersistenceError) {
        slot.faulted = true;
        slot.cancel_timer();
        let session_id = slot.session.id().clone();
        error!(
            session_id = %session_id,
            phase = %slot.session.phase(),
            error = %source,
            "critical write exhausted retries, session faulted"
        );
        metrics::record_session_faulted();
        self.publish(GameEvent::SessionFaulted {
            timestamp: chrono::Utc::now(),
            session_id,
            reason: source.to_string(),
        });
    }

    fn publish(&self, event: GameEvent) {
        // No subscribers is not an error
        let _ = self.inner.events.send(event);
    }

    fn slot(&self, session_id: &SessionId) -> Result<Arc<Mutex<SessionSlot>>, GameError> {
        self.inner
            .sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| not_found(session_id))
    }

    /// Draws session ids until one is unknown to the store.
    ///
    /// Two engines started with the same seed draw the same ids; skipping
    /// stored ones keeps a later engine from overwriting an earlier record.
    async fn claim_session(&self) -> Result<(SessionId, StdRng), EngineError> {
        let store = self.inner.mirror.store();
        for _ in 0..MAX_ID_DRAWS {
            let (session_id, rng) = self.next_session();
            match store.load_session(&session_id).await {
                Ok(None) => return Ok((session_id, rng)),
                Ok(Some(existing)) => debug!(
                    session_id = %session_id,
                    phase = %existing.phase,
                    "session id already stored, drawing another"
                ),
                Err(source) => return Err(EngineError::Persistence { session_id, source }),
            }
        }
        Err(EngineError::Persistence {
            session_id: SessionId::new(""),
            source: PersistenceError::Rejected(format!(
                "no free session id after {MAX_ID_DRAWS} draws"
            )),
        })
    }

    /// Draws a session id and a per-session random source.
    fn next_session(&self) -> (SessionId, StdRng) {
        let mut rng = self.inner.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let id = uuid::Builder::from_random_bytes(rng.random()).into_uuid();
        let seed: u64 = rng.random();
        (SessionId::new(id.to_string()), StdRng::seed_from_u64(seed))
    }
}

fn not_found(session_id: &SessionId) -> GameError {
    GameError::NotFound(format!("session {session_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::model::Role;

    fn engine(seed: u64) -> (GameEngine, Arc<InMemoryRoster>, Arc<InMemoryStore>) {
        let roster = Arc::new(InMemoryRoster::new());
        let store = Arc::new(InMemoryStore::new());
        let engine = GameEngine::builder(Arc::new(GameConfig::default()))
            .roster(roster.clone())
            .store(store.clone())
            .seed(seed)
            .build();
        (engine, roster, store)
    }

    fn lobby(roster: &InMemoryRoster, n: usize) -> RosterId {
        let id = RosterId::new("lobby");
        roster.insert(id.clone(), (0..n).map(|i| PlayerId::new(format!("p{i}"))));
        id
    }

    #[tokio::test]
    async fn create_registers_and_persists() {
        let (engine, roster, store) = engine(1);
        let lobby = lobby(&roster, 5);
        let snapshot = engine.create_session(&lobby).await.unwrap();

        assert_eq!(engine.session_count(), 1);
        assert_eq!(snapshot.phase, Phase::Tasks);
        assert_eq!(snapshot.round, 1);
        let stored = store.session(&snapshot.id).unwrap();
        assert_eq!(stored.saboteur_ids.len(), 1);

        let saboteur = &stored.saboteur_ids[0];
        assert_eq!(
            roster.entry(&lobby, saboteur).unwrap().role,
            Some(Role::Saboteur)
        );
    }

    #[tokio::test]
    async fn unknown_roster_is_a_roster_error() {
        let (engine, _, _) = engine(1);
        let err = engine
            .create_session(&RosterId::new("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Roster(_)));
        assert_eq!(engine.session_count(), 0);
    }

    #[tokio::test]
    async fn same_seed_same_session() {
        let (a, roster_a, _) = engine(9);
        let (b, roster_b, _) = engine(9);
        let sa = a.create_session(&lobby(&roster_a, 6)).await.unwrap();
        let sb = b.create_session(&lobby(&roster_b, 6)).await.unwrap();
        assert_eq!(sa.id, sb.id);
        assert_eq!(sa.cipher, sb.cipher);
    }

    #[tokio::test]
    async fn unknown_session_not_found() {
        let (engine, _, _) = engine(1);
        let err = engine
            .end_meeting(&SessionId::new("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Game(GameError::NotFound(_))));
    }

    #[tokio::test]
    async fn archive_evicts() {
        let (engine, roster, store) = engine(2);
        let snapshot = engine.create_session(&lobby(&roster, 4)).await.unwrap();
        engine.archive_session(&snapshot.id).await.unwrap();
        assert_eq!(engine.session_count(), 0);
        assert!(store.is_archived(&snapshot.id));
        assert!(matches!(
            engine.snapshot(&snapshot.id).await,
            Err(EngineError::Game(GameError::NotFound(_)))
        ));
    }
}
