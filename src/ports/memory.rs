//! In-process collaborators for the CLI and tests.

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::{DashMap, DashSet};
use indexmap::IndexMap;

use super::{IdentityResolver, PersistenceGateway, PersistenceResult, RosterProvider};
use crate::error::{IdentityError, PersistenceError, RosterError};
use crate::game::model::{
    MeetingId, MeetingRecord, PlayerId, ProgressRecord, Role, RosterId, SessionId, Task, TaskId,
    Vote,
};
use crate::game::session::SessionRecord;

/// Roster member as the lobby sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub role: Option<Role>,
    pub is_alive: bool,
}

/// Rosters held in a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryRoster {
    rosters: DashMap<RosterId, IndexMap<PlayerId, RosterEntry>>,
}

impl InMemoryRoster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a roster. Every player starts alive with no role.
    pub fn insert(&self, roster_id: RosterId, players: impl IntoIterator<Item = PlayerId>) {
        let entries = players
            .into_iter()
            .map(|p| {
                (
                    p,
                    RosterEntry {
                        role: None,
                        is_alive: true,
                    },
                )
            })
            .collect();
        self.rosters.insert(roster_id, entries);
    }

    #[must_use]
    pub fn entry(&self, roster_id: &RosterId, player_id: &PlayerId) -> Option<RosterEntry> {
        self.rosters.get(roster_id)?.get(player_id).cloned()
    }

    fn update(
        &self,
        roster_id: &RosterId,
        player_id: &PlayerId,
        apply: impl FnOnce(&mut RosterEntry),
    ) -> Result<(), RosterError> {
        let mut roster = self
            .rosters
            .get_mut(roster_id)
            .ok_or_else(|| RosterError::NotFound(roster_id.to_string()))?;
        let entry = roster
            .get_mut(player_id)
            .ok_or_else(|| RosterError::NotFound(format!("{roster_id}/{player_id}")))?;
        apply(entry);
        Ok(())
    }
}

#[async_trait::async_trait]
impl RosterProvider for InMemoryRoster {
    async fn get_roster(&self, roster_id: &RosterId) -> Result<Vec<PlayerId>, RosterError> {
        self.rosters
            .get(roster_id)
            .map(|r| r.keys().cloned().collect())
            .ok_or_else(|| RosterError::NotFound(roster_id.to_string()))
    }

    async fn set_role(
        &self,
        roster_id: &RosterId,
        player_id: &PlayerId,
        role: Role,
    ) -> Result<(), RosterError> {
        self.update(roster_id, player_id, |e| e.role = Some(role))
    }

    async fn set_alive(
        &self,
        roster_id: &RosterId,
        player_id: &PlayerId,
        is_alive: bool,
    ) -> Result<(), RosterError> {
        self.update(roster_id, player_id, |e| e.is_alive = is_alive)
    }
}

/// Document store held in concurrent maps.
///
/// [`fail_writes`](Self::fail_writes) makes the next writes fail with
/// `Unavailable`, for exercising retry and fault handling.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    sessions: DashMap<SessionId, SessionRecord>,
    tasks: DashMap<(SessionId, TaskId), Task>,
    meetings: DashMap<MeetingId, MeetingRecord>,
    votes: DashMap<(SessionId, u32, PlayerId), Vote>,
    progress: DashMap<(SessionId, PlayerId), ProgressRecord>,
    archived: DashSet<SessionId>,
    failures_left: AtomicU32,
    writes: AtomicU32,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `count` writes.
    pub fn fail_writes(&self, count: u32) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    /// Successful writes so far.
    #[must_use]
    pub fn write_count(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn session(&self, id: &SessionId) -> Option<SessionRecord> {
        self.sessions.get(id).map(|r| r.clone())
    }

    #[must_use]
    pub fn task(&self, session_id: &SessionId, task_id: &TaskId) -> Option<Task> {
        self.tasks
            .get(&(session_id.clone(), task_id.clone()))
            .map(|t| t.clone())
    }

    #[must_use]
    pub fn meeting(&self, id: &MeetingId) -> Option<MeetingRecord> {
        self.meetings.get(id).map(|m| m.clone())
    }

    /// Votes stored for a round.
    #[must_use]
    pub fn votes(&self, session_id: &SessionId, round: u32) -> Vec<Vote> {
        self.votes
            .iter()
            .filter(|e| &e.key().0 == session_id && e.key().1 == round)
            .map(|e| e.value().clone())
            .collect()
    }

    #[must_use]
    pub fn progress(&self, session_id: &SessionId, player_id: &PlayerId) -> Option<ProgressRecord> {
        self.progress
            .get(&(session_id.clone(), player_id.clone()))
            .map(|p| p.clone())
    }

    #[must_use]
    pub fn is_archived(&self, session_id: &SessionId) -> bool {
        self.archived.contains(session_id)
    }

    /// Consumes one injected failure, or counts a write.
    fn write(&self, what: &str) -> PersistenceResult<()> {
        let injected = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(PersistenceError::Unavailable(format!(
                "injected failure writing {what}"
            )));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn ensure_writable(&self, session_id: &SessionId) -> PersistenceResult<()> {
        if self.archived.contains(session_id) {
            return Err(PersistenceError::Rejected(format!(
                "session {session_id} is archived"
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl PersistenceGateway for InMemoryStore {
    async fn save_session(&self, record: &SessionRecord) -> PersistenceResult<()> {
        self.ensure_writable(&record.id)?;
        self.write("session")?;
        self.sessions.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn save_tasks(&self, tasks: &[Task]) -> PersistenceResult<()> {
        self.write("tasks")?;
        for task in tasks {
            self.tasks
                .insert((task.session_id.clone(), task.id.clone()), task.clone());
        }
        Ok(())
    }

    async fn save_task(&self, task: &Task) -> PersistenceResult<()> {
        self.ensure_writable(&task.session_id)?;
        self.write("task")?;
        self.tasks
            .insert((task.session_id.clone(), task.id.clone()), task.clone());
        Ok(())
    }

    async fn save_meeting(&self, meeting: &MeetingRecord) -> PersistenceResult<()> {
        self.ensure_writable(&meeting.session_id)?;
        self.write("meeting")?;
        self.meetings.insert(meeting.id.clone(), meeting.clone());
        Ok(())
    }

    async fn save_vote(&self, vote: &Vote) -> PersistenceResult<()> {
        self.ensure_writable(&vote.session_id)?;
        self.write("vote")?;
        self.votes.insert(
            (vote.session_id.clone(), vote.round, vote.voter_id.clone()),
            vote.clone(),
        );
        Ok(())
    }

    async fn clear_votes(&self, session_id: &SessionId, round: u32) -> PersistenceResult<()> {
        self.write("vote clear")?;
        self.votes
            .retain(|(s, r, _), _| !(s == session_id && *r == round));
        Ok(())
    }

    async fn save_progress(&self, progress: &ProgressRecord) -> PersistenceResult<()> {
        self.ensure_writable(&progress.session_id)?;
        self.write("progress")?;
        self.progress.insert(
            (progress.session_id.clone(), progress.player_id.clone()),
            progress.clone(),
        );
        Ok(())
    }

    async fn archive_session(&self, session_id: &SessionId) -> PersistenceResult<()> {
        self.write("archive")?;
        self.archived.insert(session_id.clone());
        Ok(())
    }

    async fn load_session(
        &self,
        session_id: &SessionId,
    ) -> PersistenceResult<Option<SessionRecord>> {
        Ok(self.session(session_id))
    }
}

/// Fixed token → player table.
#[derive(Debug, Default)]
pub struct StaticIdentity {
    tokens: DashMap<String, PlayerId>,
}

impl StaticIdentity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: impl Into<String>, player_id: PlayerId) {
        self.tokens.insert(token.into(), player_id);
    }

    pub fn revoke(&self, token: &str) {
        self.tokens.remove(token);
    }
}

#[async_trait::async_trait]
impl IdentityResolver for StaticIdentity {
    async fn resolve(&self, token: &str) -> Result<PlayerId, IdentityError> {
        self.tokens
            .get(token)
            .map(|p| p.clone())
            .ok_or(IdentityError::InvalidToken)
    }
}
