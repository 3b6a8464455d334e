//! Game rules.
//!
//! Everything in this module is synchronous and deterministic for a
//! given random source. The async engine wraps it with locking,
//! persistence and timers.

pub mod cipher;
pub mod meeting;
pub mod model;
pub mod roles;
pub mod session;
pub mod tasks;
pub mod vote;
pub mod win;

pub use cipher::{CipherChange, CipherState, CipherView};
pub use meeting::MeetingCoordinator;
pub use model::*;
pub use session::{Session, SessionEffect, SessionRecord, SessionSnapshot, TaskCompletion};
pub use tasks::TaskTracker;
pub use vote::{BallotBox, BallotOutcome, Tally};
