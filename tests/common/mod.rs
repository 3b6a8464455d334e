//! Shared integration-test harness: engine fixtures and a helper for
//! running the `cipherhunt` binary.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::Arc;

use cipherhunt::config::GameConfig;
use cipherhunt::engine::GameEngine;
use cipherhunt::game::model::{PlayerId, Role, RosterId, SessionId, TaskId};
use cipherhunt::ports::{InMemoryRoster, InMemoryStore, StaticIdentity};

/// Runs the `cipherhunt` binary to completion.
pub struct CipherHuntProcess;

impl CipherHuntProcess {
    /// Runs a command and returns its output.
    #[allow(clippy::missing_panics_doc)]
    pub fn run(args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_cipherhunt"))
            .args(args)
            .env_remove("CIPHERHUNT_LOG_LEVEL")
            .env_remove("CIPHERHUNT_CONFIG")
            .output()
            .expect("failed to spawn cipherhunt")
    }

    /// Returns the path to a test fixture.
    #[must_use]
    pub fn fixture_path(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }
}

/// An engine wired to in-memory collaborators the test can inspect.
pub struct Harness {
    pub engine: GameEngine,
    pub roster: Arc<InMemoryRoster>,
    pub store: Arc<InMemoryStore>,
    pub identity: Arc<StaticIdentity>,
    pub config: Arc<GameConfig>,
    pub lobby: RosterId,
}

impl Harness {
    /// Builds an engine and registers a lobby of `players` named `p0..`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: GameConfig, players: usize, seed: u64) -> Self {
        let config = Arc::new(config);
        let roster = Arc::new(InMemoryRoster::new());
        let store = Arc::new(InMemoryStore::new());
        let identity = Arc::new(StaticIdentity::new());
        let lobby = RosterId::new("lobby");
        roster.insert(
            lobby.clone(),
            (0..players).map(|i| PlayerId::new(format!("p{i}"))),
        );
        let engine = GameEngine::builder(Arc::clone(&config))
            .roster(roster.clone())
            .store(store.clone())
            .identity(identity.clone())
            .seed(seed)
            .build();
        Self {
            engine,
            roster,
            store,
            identity,
            config,
            lobby,
        }
    }

    /// Starts a session on the harness lobby.
    pub async fn start(&self) -> SessionId {
        self.engine
            .create_session(&self.lobby)
            .await
            .expect("session should start")
            .id
    }

    /// Players holding `role`, in join order.
    pub fn players_with(&self, role: Role) -> Vec<PlayerId> {
        let snapshot_players = (0..)
            .map(|i| PlayerId::new(format!("p{i}")))
            .take_while(|p| self.roster.entry(&self.lobby, p).is_some());
        snapshot_players
            .filter(|p| {
                self.roster
                    .entry(&self.lobby, p)
                    .is_some_and(|e| e.role == Some(role))
            })
            .collect()
    }

    /// Ids of `player`'s tasks, in catalog order.
    pub fn tasks_of(&self, player: &PlayerId, role: Role) -> Vec<TaskId> {
        let catalog = match role {
            Role::Majority => &self.config.tasks.majority,
            Role::Saboteur => &self.config.tasks.saboteur,
        };
        catalog
            .iter()
            .map(|t| TaskId::for_player(player, &t.key))
            .collect()
    }
}

/// A config with the proximity check off, so tests can omit positions.
pub fn open_config() -> GameConfig {
    let mut config = GameConfig::default();
    config.tasks.proximity_threshold = None;
    config
}
