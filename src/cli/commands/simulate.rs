//! `simulate`: a seeded match played by bots.
//!
//! Builds an engine with in-memory collaborators, streams every published
//! event as JSONL, and drives the match with simple bots until a faction
//! wins or the round limit is hit. The same seed replays the same match.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::cli::args::{OutputFormat, SimulateArgs};
use crate::config::{ConfigLoader, GameConfig};
use crate::engine::GameEngine;
use crate::error::CipherHuntError;
use crate::game::model::{Outcome, Phase, PlayerId, Role, RosterId, SessionId, TaskId};
use crate::game::session::SessionSnapshot;
use crate::observability::{EventEmitter, init_metrics};
use crate::ports::{InMemoryRoster, InMemoryStore};

/// Chance that a bot calls an emergency meeting instead of working.
const EMERGENCY_CHANCE: f64 = 0.05;

/// Chance that a majority bot skips instead of accusing someone.
const SKIP_CHANCE: f64 = 0.3;

/// How long to wait for the event stream to drain after the match.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

const CHATTER: &[&str] = &[
    "I was in navigation the whole time.",
    "Someone keeps scrambling the cipher.",
    "Skip, not enough info.",
    "I saw someone near the relay.",
    "My tasks are almost done.",
];

/// End-of-match summary.
#[derive(Debug, Serialize)]
struct Summary {
    session_id: String,
    seed: u64,
    players: usize,
    rounds: u32,
    outcome: Option<Outcome>,
    decrypted_percentage: u32,
    aggregate_progress: u32,
    survivors: Vec<PlayerId>,
    events: u64,
}

struct Bot {
    id: PlayerId,
    role: Role,
    tasks: Vec<TaskId>,
}

/// Run a bot match.
///
/// # Errors
///
/// Returns an error if the configuration does not load, the event file
/// cannot be created, or the engine rejects a bot action.
pub async fn run(args: &SimulateArgs, quiet: bool) -> Result<(), CipherHuntError> {
    let config = match &args.config {
        Some(path) => {
            let loaded = ConfigLoader::default().load(path)?;
            for warning in &loaded.warnings {
                tracing::warn!(
                    location = warning.location.as_deref().unwrap_or("<unknown>"),
                    "{}",
                    warning.message
                );
            }
            loaded.config
        }
        None => Arc::new(GameConfig::default()),
    };

    if args.metrics_port.is_some() {
        init_metrics(args.metrics_port)?;
    }

    let emitter = Arc::new(match &args.events {
        Some(path) => EventEmitter::from_file(path)?,
        None if args.no_events || quiet => EventEmitter::noop(),
        None => EventEmitter::stdout(),
    });

    let roster = Arc::new(InMemoryRoster::new());
    let store = Arc::new(InMemoryStore::new());
    let lobby = RosterId::new(format!("lobby-{}", args.seed));
    let players: Vec<PlayerId> = (1..=args.players)
        .map(|i| PlayerId::new(format!("player-{i:02}")))
        .collect();
    roster.insert(lobby.clone(), players.iter().cloned());

    let engine = GameEngine::builder(Arc::clone(&config))
        .roster(roster.clone())
        .store(store)
        .seed(args.seed)
        .build();

    let forwarder = {
        let emitter = Arc::clone(&emitter);
        let mut stream = BroadcastStream::new(engine.subscribe());
        tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(event) => emitter.emit(&event),
                    Err(BroadcastStreamRecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "event stream lagged");
                    }
                }
            }
        })
    };

    let created = engine.create_session(&lobby).await?;
    let session_id = created.id.clone();
    tracing::info!(
        session_id = %session_id,
        players = players.len(),
        seed = args.seed,
        "simulation started"
    );

    let mut bots: Vec<Bot> = players
        .iter()
        .map(|id| {
            let role = roster
                .entry(&lobby, id)
                .and_then(|e| e.role)
                .unwrap_or(Role::Majority);
            let catalog = match role {
                Role::Majority => &config.tasks.majority,
                Role::Saboteur => &config.tasks.saboteur,
            };
            Bot {
                id: id.clone(),
                role,
                tasks: catalog
                    .iter()
                    .map(|t| TaskId::for_player(id, &t.key))
                    .collect(),
            }
        })
        .collect();

    let mut rng = StdRng::seed_from_u64(args.seed.wrapping_add(1));
    let final_snapshot = play(&engine, &mut bots, &mut rng, args.max_rounds, &session_id).await?;

    engine.archive_session(&session_id).await?;
    engine.shutdown();
    drop(engine);
    if tokio::time::timeout(DRAIN_TIMEOUT, forwarder).await.is_err() {
        tracing::warn!("event stream did not drain in time");
    }

    let summary = Summary {
        session_id: session_id.to_string(),
        seed: args.seed,
        players: players.len(),
        rounds: final_snapshot.round,
        outcome: final_snapshot.outcome,
        decrypted_percentage: final_snapshot.cipher.decrypted_percentage,
        aggregate_progress: final_snapshot.aggregate_progress,
        survivors: final_snapshot.alive_players.clone(),
        events: emitter.event_count(),
    };
    if !quiet {
        print_summary(&summary, args.format)?;
    }
    Ok(())
}

async fn play(
    engine: &GameEngine,
    bots: &mut [Bot],
    rng: &mut StdRng,
    max_rounds: u32,
    session_id: &SessionId,
) -> Result<SessionSnapshot, CipherHuntError> {
    loop {
        let snapshot = engine.snapshot(session_id).await?;
        if snapshot.outcome.is_some() || snapshot.round > max_rounds {
            if snapshot.outcome.is_none() {
                tracing::info!(rounds = max_rounds, "round limit reached without a winner");
            }
            return Ok(snapshot);
        }

        match snapshot.phase {
            Phase::Tasks => work(engine, bots, rng, &snapshot).await?,
            Phase::Meeting => {
                for bot in bots.iter().filter(|b| snapshot.alive_players.contains(&b.id)) {
                    if rng.random_bool(0.5)
                        && let Some(line) = CHATTER.choose(rng)
                    {
                        engine.send_meeting_message(session_id, &bot.id, line).await?;
                    }
                }
                engine.end_meeting(session_id).await?;
            }
            Phase::Voting => vote(engine, bots, rng, &snapshot).await?,
            Phase::Ended => return Ok(snapshot),
        }
    }
}

/// One bot action during `TASKS`.
async fn work(
    engine: &GameEngine,
    bots: &mut [Bot],
    rng: &mut StdRng,
    snapshot: &SessionSnapshot,
) -> Result<(), CipherHuntError> {
    let alive: Vec<usize> = (0..bots.len())
        .filter(|&i| snapshot.alive_players.contains(&bots[i].id))
        .collect();
    let busy: Vec<usize> = alive
        .iter()
        .copied()
        .filter(|&i| !bots[i].tasks.is_empty())
        .collect();

    let Some(&caller) = alive.choose(rng) else {
        return Ok(());
    };
    if busy.is_empty() || rng.random_bool(EMERGENCY_CHANCE) {
        engine.call_emergency(&snapshot.id, &bots[caller].id).await?;
        return Ok(());
    }

    let Some(&worker) = busy.choose(rng) else {
        return Ok(());
    };
    let bot = &mut bots[worker];
    let pick = rng.random_range(0..bot.tasks.len());
    let task_id = bot.tasks.swap_remove(pick);
    let receipt = engine
        .complete_task(&snapshot.id, &bot.id, &task_id, None)
        .await?;
    tracing::debug!(
        player_id = %bot.id,
        role = %bot.role,
        task_id = %receipt.task_id,
        decrypted = receipt.cipher.decrypted_percentage,
        "bot completed task"
    );
    Ok(())
}

/// Every living bot casts one ballot.
async fn vote(
    engine: &GameEngine,
    bots: &[Bot],
    rng: &mut StdRng,
    snapshot: &SessionSnapshot,
) -> Result<(), CipherHuntError> {
    let alive: Vec<&Bot> = bots
        .iter()
        .filter(|b| snapshot.alive_players.contains(&b.id))
        .collect();

    for voter in &alive {
        let candidates: Vec<&PlayerId> = alive
            .iter()
            .filter(|b| b.id != voter.id)
            .filter(|b| voter.role == Role::Majority || b.role == Role::Majority)
            .map(|b| &b.id)
            .collect();
        let target = if voter.role == Role::Majority && rng.random_bool(SKIP_CHANCE) {
            None
        } else {
            candidates.choose(rng).copied()
        };
        let receipt = engine.cast_vote(&snapshot.id, &voter.id, target).await?;
        if let Some(tally) = receipt.tally {
            tracing::debug!(
                eliminated = ?tally.eliminated,
                phase = %receipt.phase,
                "vote resolved"
            );
            break;
        }
    }
    Ok(())
}

fn print_summary(summary: &Summary, format: OutputFormat) -> Result<(), CipherHuntError> {
    match format {
        OutputFormat::Human => {
            eprintln!("session    {}", summary.session_id);
            eprintln!("seed       {}", summary.seed);
            eprintln!("players    {}", summary.players);
            eprintln!("rounds     {}", summary.rounds);
            match summary.outcome {
                Some(outcome) => eprintln!("winner     {} ({})", outcome.winner, outcome.reason),
                None => eprintln!("winner     none"),
            }
            eprintln!("decrypted  {}%", summary.decrypted_percentage);
            eprintln!("progress   {}%", summary.aggregate_progress);
            eprintln!("survivors  {}", summary.survivors.len());
            eprintln!("events     {}", summary.events);
        }
        OutputFormat::Json => eprintln!("{}", serde_json::to_string(summary)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(seed: u64) -> SimulateArgs {
        SimulateArgs {
            config: None,
            seed,
            players: 5,
            max_rounds: 30,
            events: None,
            no_events: true,
            format: OutputFormat::Json,
            metrics_port: None,
        }
    }

    #[tokio::test]
    async fn simulation_runs_to_completion() {
        run(&args(3), true).await.unwrap();
    }

    #[tokio::test]
    async fn events_written_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut a = args(11);
        a.no_events = false;
        a.events = Some(path.clone());
        run(&a, true).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let first: serde_json::Value =
            serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first["sequence"], 0);
        assert_eq!(first["type"], "session.created");
        assert!(text.lines().any(|l| l.contains("\"session.archived\"")));
    }
}
