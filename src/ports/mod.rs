//! Collaborator interfaces.
//!
//! The engine talks to the outside world only through these traits:
//! the lobby roster, the durable store, and the identity service. The
//! [`memory`] module provides in-process implementations.

pub mod memory;

pub use memory::{InMemoryRoster, InMemoryStore, StaticIdentity};

use crate::error::{IdentityError, PersistenceError, RosterError};
use crate::game::model::{
    MeetingRecord, PlayerId, ProgressRecord, Role, RosterId, SessionId, Task, Vote,
};
use crate::game::session::SessionRecord;

/// Result type alias for durable store operations.
pub type PersistenceResult<T> = std::result::Result<T, PersistenceError>;

/// Lobby roster access.
#[async_trait::async_trait]
pub trait RosterProvider: Send + Sync {
    /// Players in the roster, in join order.
    async fn get_roster(&self, roster_id: &RosterId) -> Result<Vec<PlayerId>, RosterError>;

    /// Publishes a player's assigned role back to the roster.
    async fn set_role(
        &self,
        roster_id: &RosterId,
        player_id: &PlayerId,
        role: Role,
    ) -> Result<(), RosterError>;

    /// Publishes a player's alive flag back to the roster.
    async fn set_alive(
        &self,
        roster_id: &RosterId,
        player_id: &PlayerId,
        is_alive: bool,
    ) -> Result<(), RosterError>;
}

/// Durable document store.
///
/// Writes are upserts keyed by the record's natural id. The store is
/// eventually consistent with the in-memory session.
#[async_trait::async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn save_session(&self, record: &SessionRecord) -> PersistenceResult<()>;

    /// Bulk insert of the task catalog at session start.
    async fn save_tasks(&self, tasks: &[Task]) -> PersistenceResult<()>;

    async fn save_task(&self, task: &Task) -> PersistenceResult<()>;

    async fn save_meeting(&self, meeting: &MeetingRecord) -> PersistenceResult<()>;

    async fn save_vote(&self, vote: &Vote) -> PersistenceResult<()>;

    /// Drops every vote recorded for `round`.
    async fn clear_votes(&self, session_id: &SessionId, round: u32) -> PersistenceResult<()>;

    async fn save_progress(&self, progress: &ProgressRecord) -> PersistenceResult<()>;

    /// Marks the session archived. Archived sessions are read-only.
    async fn archive_session(&self, session_id: &SessionId) -> PersistenceResult<()>;

    async fn load_session(&self, session_id: &SessionId)
    -> PersistenceResult<Option<SessionRecord>>;
}

/// Maps a caller token to a player id.
#[async_trait::async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<PlayerId, IdentityError>;
}
