mod common;

use std::sync::Arc;
use std::time::Duration;

use cipherhunt::engine::{Action, ActionReply, GameEngine};
use cipherhunt::error::{EngineError, GameError};
use cipherhunt::game::model::{Phase, Role, SessionId, WinReason};
use cipherhunt::observability::GameEvent;
use common::{Harness, open_config};
use tokio::sync::broadcast;

fn drain(rx: &mut broadcast::Receiver<GameEvent>) -> Vec<GameEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn count(events: &[GameEvent], name: &str) -> usize {
    events.iter().filter(|e| e.name() == name).count()
}

async fn wait_for_phase(h: &Harness, session: &SessionId, phase: Phase) {
    for _ in 0..100 {
        if h.engine.snapshot(session).await.unwrap().phase == phase {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session never reached {phase}");
}

/// Completes the first task of the first `n` majority players.
async fn majority_work(h: &Harness, session: &SessionId, n: usize) {
    for player in h.players_with(Role::Majority).iter().take(n) {
        let task = h.tasks_of(player, Role::Majority)[0].clone();
        h.engine
            .complete_task(session, player, &task, None)
            .await
            .unwrap();
    }
}

// ============================================================================
// Meetings and timers
// ============================================================================

#[tokio::test(start_paused = true)]
async fn third_majority_task_opens_meeting_that_times_out() {
    let h = Harness::new(open_config(), 5, 1);
    let mut rx = h.engine.subscribe();
    let session = h.start().await;

    majority_work(&h, &session, 3).await;
    let snapshot = h.engine.snapshot(&session).await.unwrap();
    assert_eq!(snapshot.phase, Phase::Meeting);
    let meeting = snapshot.meeting.unwrap();

    tokio::time::sleep(h.config.meeting.duration + Duration::from_secs(1)).await;
    wait_for_phase(&h, &session, Phase::Voting).await;

    let events = drain(&mut rx);
    assert_eq!(count(&events, "meeting.started"), 1);
    assert_eq!(count(&events, "meeting.ended"), 1);
    assert_eq!(count(&events, "voting.started"), 1);
    let stored = h.store.meeting(&meeting.id).unwrap();
    assert!(stored.ended_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn explicit_end_disarms_timer() {
    let h = Harness::new(open_config(), 5, 2);
    let session = h.start().await;
    let caller = h.players_with(Role::Majority)[0].clone();

    h.engine.call_emergency(&session, &caller).await.unwrap();
    h.engine.end_meeting(&session).await.unwrap();
    let mut rx = h.engine.subscribe();

    tokio::time::sleep(h.config.meeting.duration * 2).await;
    let snapshot = h.engine.snapshot(&session).await.unwrap();
    assert_eq!(snapshot.phase, Phase::Voting);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn archive_cancels_meeting_timer() {
    let h = Harness::new(open_config(), 4, 3);
    let session = h.start().await;
    let caller = h.players_with(Role::Majority)[0].clone();
    h.engine.call_emergency(&session, &caller).await.unwrap();

    let mut rx = h.engine.subscribe();
    h.engine.archive_session(&session).await.unwrap();
    tokio::time::sleep(h.config.meeting.duration * 2).await;

    let events = drain(&mut rx);
    assert_eq!(count(&events, "session.archived"), 1);
    assert_eq!(count(&events, "meeting.ended"), 0);
    assert!(h.store.is_archived(&session));
    assert_eq!(h.engine.session_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_completions_start_one_meeting() {
    let h = Harness::new(open_config(), 6, 4);
    let mut rx = h.engine.subscribe();
    let session = h.start().await;

    let mut handles = Vec::new();
    for player in h.players_with(Role::Majority).into_iter().take(4) {
        let engine = h.engine.clone();
        let session = session.clone();
        let task = h.tasks_of(&player, Role::Majority)[0].clone();
        handles.push(tokio::spawn(async move {
            engine.complete_task(&session, &player, &task, None).await
        }));
    }

    let mut accepted = 0;
    let mut wrong_phase = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(EngineError::Game(GameError::InvalidPhase { .. })) => wrong_phase += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(accepted, 3);
    assert_eq!(wrong_phase, 1);

    let events = drain(&mut rx);
    assert_eq!(count(&events, "meeting.started"), 1);
    assert_eq!(count(&events, "task.updated"), 3);
    assert_eq!(
        h.engine.snapshot(&session).await.unwrap().phase,
        Phase::Meeting
    );
}

// ============================================================================
// Voting
// ============================================================================

#[tokio::test]
async fn voting_out_the_saboteur_ends_the_game() {
    let h = Harness::new(open_config(), 4, 5);
    let mut rx = h.engine.subscribe();
    let session = h.start().await;
    let saboteur = h.players_with(Role::Saboteur)[0].clone();
    let majority = h.players_with(Role::Majority);

    h.engine.call_emergency(&session, &majority[0]).await.unwrap();
    h.engine
        .send_meeting_message(&session, &majority[0], "it was them")
        .await
        .unwrap();
    h.engine.end_meeting(&session).await.unwrap();

    for voter in &majority {
        let receipt = h
            .engine
            .cast_vote(&session, voter, Some(&saboteur))
            .await
            .unwrap();
        assert!(receipt.tally.is_none());
        assert!(!h.store.votes(&session, 1).is_empty());
    }
    let receipt = h
        .engine
        .cast_vote(&session, &saboteur, Some(&majority[0]))
        .await
        .unwrap();
    let tally = receipt.tally.unwrap();
    assert_eq!(tally.eliminated.as_ref(), Some(&saboteur));
    assert_eq!(receipt.phase, Phase::Ended);

    let snapshot = h.engine.snapshot(&session).await.unwrap();
    let outcome = snapshot.outcome.unwrap();
    assert_eq!(outcome.winner, Role::Majority);
    assert_eq!(outcome.reason, WinReason::SaboteurEliminated);

    let record = h.store.session(&session).unwrap();
    assert_eq!(record.phase, Phase::Ended);
    assert!(h.store.votes(&session, 1).is_empty());
    assert!(!h.roster.entry(&h.lobby, &saboteur).unwrap().is_alive);

    let events = drain(&mut rx);
    assert_eq!(count(&events, "voting.resolved"), 1);
    assert_eq!(count(&events, "game.ended"), 1);

    let late = h
        .engine
        .call_emergency(&session, &majority[0])
        .await
        .unwrap_err();
    assert!(matches!(
        late,
        EngineError::Game(GameError::InvalidPhase {
            phase: Phase::Ended,
            ..
        })
    ));
}

#[tokio::test]
async fn split_vote_starts_next_round() {
    let h = Harness::new(open_config(), 4, 6);
    let session = h.start().await;
    let players: Vec<_> = h
        .players_with(Role::Majority)
        .into_iter()
        .chain(h.players_with(Role::Saboteur))
        .collect();

    h.engine.call_emergency(&session, &players[0]).await.unwrap();
    h.engine.end_meeting(&session).await.unwrap();
    for (i, voter) in players.iter().enumerate() {
        let target = if i % 2 == 0 { &players[0] } else { &players[1] };
        h.engine
            .cast_vote(&session, voter, Some(target))
            .await
            .unwrap();
    }

    let snapshot = h.engine.snapshot(&session).await.unwrap();
    assert_eq!(snapshot.phase, Phase::Tasks);
    assert_eq!(snapshot.round, 2);
    assert_eq!(snapshot.alive_players.len(), 4);
}

// ============================================================================
// Cipher race
// ============================================================================

#[tokio::test]
async fn saboteur_decrypts_and_wins() {
    let mut config = open_config();
    config.cipher.reveal_step = 50;
    let h = Harness::new(config, 4, 7);
    let session = h.start().await;
    let saboteur = h.players_with(Role::Saboteur)[0].clone();
    let tasks = h.tasks_of(&saboteur, Role::Saboteur);

    let first = h
        .engine
        .complete_task(&session, &saboteur, &tasks[0], None)
        .await
        .unwrap();
    assert_eq!(first.cipher.decrypted_percentage, 50);
    assert_eq!(first.phase, Phase::Tasks);

    let second = h
        .engine
        .complete_task(&session, &saboteur, &tasks[1], None)
        .await
        .unwrap();
    assert_eq!(second.cipher.decrypted_percentage, 100);
    assert_eq!(second.phase, Phase::Ended);

    let outcome = h.engine.snapshot(&session).await.unwrap().outcome.unwrap();
    assert_eq!(outcome.winner, Role::Saboteur);
    assert_eq!(outcome.reason, WinReason::DecryptionComplete);
    assert!(!h.store.session(&session).unwrap().mask.contains('*'));
}

#[tokio::test]
async fn progress_is_rebuilt_from_tasks() {
    let h = Harness::new(open_config(), 5, 8);
    let session = h.start().await;
    majority_work(&h, &session, 2).await;

    let records = h.engine.rebuild_progress(&session).await.unwrap();
    assert_eq!(records.len(), 5);
    let worker = &h.players_with(Role::Majority)[0];
    let mine = h.engine.progress(&session, worker).await.unwrap();
    assert_eq!(mine.tasks_completed_count, 1);
    assert_eq!(mine.total_points, h.config.tasks.majority[0].points);
    assert_eq!(h.store.progress(&session, worker).unwrap(), mine);
}

// ============================================================================
// Durability
// ============================================================================

#[tokio::test(start_paused = true)]
async fn exhausted_critical_write_faults_session() {
    let h = Harness::new(open_config(), 5, 9);
    let mut rx = h.engine.subscribe();
    let session = h.start().await;
    majority_work(&h, &session, 2).await;

    h.store.fail_writes(1_000);
    let majority = h.players_with(Role::Majority);
    let task = h.tasks_of(&majority[2], Role::Majority)[0].clone();
    let err = h
        .engine
        .complete_task(&session, &majority[2], &task, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Persistence { .. }));

    let again = h
        .engine
        .call_emergency(&session, &majority[0])
        .await
        .unwrap_err();
    assert!(matches!(again, EngineError::SessionFaulted(_)));

    let events = drain(&mut rx);
    assert_eq!(count(&events, "session.faulted"), 1);
    assert_eq!(count(&events, "meeting.started"), 0);

    // Faulted sessions are evicted even while the store is down.
    h.engine.archive_session(&session).await.unwrap();
    assert_eq!(h.engine.session_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried() {
    let h = Harness::new(open_config(), 5, 10);
    let session = h.start().await;
    let caller = h.players_with(Role::Majority)[0].clone();

    h.store.fail_writes(2);
    h.engine.call_emergency(&session, &caller).await.unwrap();
    assert_eq!(h.store.session(&session).unwrap().phase, Phase::Meeting);
}

#[tokio::test]
async fn reseeded_engine_skips_stored_session_ids() {
    let h = Harness::new(open_config(), 4, 12);
    let first = h.start().await;
    let caller = h.players_with(Role::Majority)[0].clone();
    h.engine.call_emergency(&first, &caller).await.unwrap();

    // Same seed, same store: the first id it draws is already taken.
    let restarted = GameEngine::builder(Arc::clone(&h.config))
        .roster(h.roster.clone())
        .store(h.store.clone())
        .seed(12)
        .build();
    let second = restarted.create_session(&h.lobby).await.unwrap();

    assert_ne!(second.id, first);
    assert_eq!(h.store.session(&first).unwrap().phase, Phase::Meeting);
    assert_eq!(h.store.session(&second.id).unwrap().phase, Phase::Tasks);
}

// ============================================================================
// Dispatch
// ============================================================================

#[tokio::test]
async fn dispatch_resolves_tokens() {
    let h = Harness::new(open_config(), 4, 11);
    let session = h.start().await;
    let player = h.players_with(Role::Majority)[0].clone();
    h.identity.insert("tok-1", player.clone());

    let reply = h
        .engine
        .dispatch(&session, "tok-1", Action::CallEmergency)
        .await
        .unwrap();
    assert!(matches!(reply, ActionReply::MeetingCalled { .. }));

    let reply = h
        .engine
        .dispatch(
            &session,
            "tok-1",
            Action::SendMeetingMessage {
                text: "hello".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(reply, ActionReply::MessagePosted);

    let unknown = h
        .engine
        .dispatch(&session, "nope", Action::CallEmergency)
        .await
        .unwrap_err();
    assert!(matches!(unknown, EngineError::Identity(_)));

    h.identity.revoke("tok-1");
    let revoked = h
        .engine
        .dispatch(&session, "tok-1", Action::CastVote { target: None })
        .await
        .unwrap_err();
    assert!(matches!(revoked, EngineError::Identity(_)));
}
