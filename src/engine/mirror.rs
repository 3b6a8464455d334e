//! Durable mirror.
//!
//! Wraps the persistence gateway with two write modes. Critical writes
//! (session snapshots on phase change, elimination, and win) are retried
//! with exponential backoff; best-effort writes (tasks, chat, votes,
//! progress) are attempted once and their failures are logged.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::schema::PersistenceSettings;
use crate::game::model::{MeetingRecord, ProgressRecord, SessionId, Task, Vote};
use crate::game::session::SessionRecord;
use crate::observability::metrics;
use crate::ports::{PersistenceGateway, PersistenceResult};

/// Backoff schedule for critical writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): doubles each time,
    /// capped at `max_backoff`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl From<&PersistenceSettings> for RetryPolicy {
    fn from(settings: &PersistenceSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: settings.initial_backoff,
            max_backoff: settings.max_backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&PersistenceSettings::default())
    }
}

/// One durable write.
#[derive(Debug, Clone, Copy)]
pub enum DurableWrite<'a> {
    Session(&'a SessionRecord),
    Tasks(&'a [Task]),
    Task(&'a Task),
    Meeting(&'a MeetingRecord),
    Vote(&'a Vote),
    ClearVotes { session_id: &'a SessionId, round: u32 },
    Progress(&'a ProgressRecord),
    Archive(&'a SessionId),
}

impl DurableWrite<'_> {
    /// Short name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Session(_) => "session",
            Self::Tasks(_) => "tasks",
            Self::Task(_) => "task",
            Self::Meeting(_) => "meeting",
            Self::Vote(_) => "vote",
            Self::ClearVotes { .. } => "clear_votes",
            Self::Progress(_) => "progress",
            Self::Archive(_) => "archive",
        }
    }
}

/// Persistence gateway plus retry policy.
#[derive(Clone)]
pub struct DurableMirror {
    store: Arc<dyn PersistenceGateway>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for DurableMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableMirror")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl DurableMirror {
    #[must_use]
    pub fn new(store: Arc<dyn PersistenceGateway>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn PersistenceGateway> {
        &self.store
    }

    async fn execute(&self, write: DurableWrite<'_>) -> PersistenceResult<()> {
        match write {
            DurableWrite::Session(record) => self.store.save_session(record).await,
            DurableWrite::Tasks(tasks) => self.store.save_tasks(tasks).await,
            DurableWrite::Task(task) => self.store.save_task(task).await,
            DurableWrite::Meeting(meeting) => self.store.save_meeting(meeting).await,
            DurableWrite::Vote(vote) => self.store.save_vote(vote).await,
            DurableWrite::ClearVotes { session_id, round } => {
                self.store.clear_votes(session_id, round).await
            }
            DurableWrite::Progress(progress) => self.store.save_progress(progress).await,
            DurableWrite::Archive(session_id) => self.store.archive_session(session_id).await,
        }
    }

    /// Retries `write` until it succeeds or the attempts run out.
    ///
    /// # Errors
    ///
    /// Returns the last store error once every attempt failed.
    pub async fn critical(&self, write: DurableWrite<'_>) -> PersistenceResult<()> {
        let mut attempt = 1;
        loop {
            match self.execute(write).await {
                Ok(()) => {
                    if attempt > 1 {
                        debug!(kind = write.kind(), attempt, "critical write recovered");
                    }
                    return Ok(());
                }
                Err(err) if attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay(attempt);
                    warn!(
                        kind = write.kind(),
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        retry_in = ?delay,
                        error = %err,
                        "critical write failed, retrying"
                    );
                    metrics::record_persistence_failure(true);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    metrics::record_persistence_failure(true);
                    return Err(err);
                }
            }
        }
    }

    /// Attempts `write` once; failures are logged and swallowed.
    pub async fn best_effort(&self, write: DurableWrite<'_>) {
        if let Err(err) = self.execute(write).await {
            warn!(kind = write.kind(), error = %err, "best-effort write failed");
            metrics::record_persistence_failure(false);
        }
    }
}
