//! Metrics collection.
//!
//! Prometheus-compatible metrics through the `metrics` facade. Every label
//! value comes from a closed set so cardinality stays bounded; player and
//! session ids are never used as labels.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{CipherHuntError, EngineError};
use crate::game::model::{MeetingReason, Outcome, Phase, Role, WinReason};

/// Guard against installing the recorder twice.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Installs the global metrics recorder.
///
/// With `Some(port)` a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`; with `None` metrics are recorded but not exposed.
///
/// # Errors
///
/// Returns `CipherHuntError::Io` if the recorder or listener cannot be
/// installed.
pub fn init_metrics(port: Option<u16>) -> Result<(), CipherHuntError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| CipherHuntError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_gauge!("cipherhunt_sessions_active", "Sessions held in memory");
    describe_counter!(
        "cipherhunt_sessions_total",
        "Sessions created since start"
    );
    describe_counter!(
        "cipherhunt_actions_total",
        "Player actions by action and outcome"
    );
    describe_counter!(
        "cipherhunt_phase_transitions_total",
        "Phase transitions by target phase"
    );
    describe_counter!("cipherhunt_meetings_total", "Meetings started by reason");
    describe_counter!(
        "cipherhunt_tallies_total",
        "Vote tallies by result (eliminated or none)"
    );
    describe_counter!("cipherhunt_games_total", "Finished games by winner and reason");
    describe_counter!(
        "cipherhunt_persistence_failures_total",
        "Durable write failures by criticality"
    );
    describe_counter!(
        "cipherhunt_sessions_faulted_total",
        "Sessions frozen after an exhausted critical write"
    );
}

/// Outcome label for an action result: `ok`, a game error code, or the
/// kind of engine failure.
#[must_use]
pub const fn outcome_label<T>(result: &Result<T, EngineError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(EngineError::Game(e)) => e.code(),
        Err(EngineError::Persistence { .. }) => "persistence",
        Err(EngineError::SessionFaulted(_)) => "faulted",
        Err(EngineError::Roster(_)) => "roster",
        Err(EngineError::Identity(_)) => "identity",
    }
}

/// Records one player action. `action` must be a static action name.
pub fn record_action<T>(action: &'static str, result: &Result<T, EngineError>) {
    counter!(
        "cipherhunt_actions_total",
        "action" => action,
        "outcome" => outcome_label(result),
    )
    .increment(1);
}

pub fn record_session_created() {
    counter!("cipherhunt_sessions_total").increment(1);
}

#[allow(clippy::cast_precision_loss)]
pub fn set_sessions_active(count: usize) {
    gauge!("cipherhunt_sessions_active").set(count as f64);
}

pub fn record_phase(phase: Phase) {
    let label = match phase {
        Phase::Tasks => "TASKS",
        Phase::Meeting => "MEETING",
        Phase::Voting => "VOTING",
        Phase::Ended => "ENDED",
    };
    counter!("cipherhunt_phase_transitions_total", "to" => label).increment(1);
}

pub fn record_meeting(reason: &MeetingReason) {
    let label = match reason {
        MeetingReason::TaskThreshold { .. } => "task_threshold",
        MeetingReason::Emergency { .. } => "emergency",
    };
    counter!("cipherhunt_meetings_total", "reason" => label).increment(1);
}

pub fn record_tally(eliminated: bool) {
    let label = if eliminated { "eliminated" } else { "none" };
    counter!("cipherhunt_tallies_total", "result" => label).increment(1);
}

pub fn record_game_ended(outcome: Outcome) {
    let winner = match outcome.winner {
        Role::Majority => "majority",
        Role::Saboteur => "saboteur",
    };
    let reason = match outcome.reason {
        WinReason::DecryptionComplete => "decryption_complete",
        WinReason::SaboteurEliminated => "saboteur_eliminated",
        WinReason::Survival => "survival",
    };
    counter!("cipherhunt_games_total", "winner" => winner, "reason" => reason).increment(1);
}

pub fn record_persistence_failure(critical: bool) {
    let label = if critical { "critical" } else { "best_effort" };
    counter!("cipherhunt_persistence_failures_total", "kind" => label).increment(1);
}

pub fn record_session_faulted() {
    counter!("cipherhunt_sessions_faulted_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GameError;
    use crate::game::model::{PlayerId, SessionId};

    #[test]
    fn outcome_labels() {
        assert_eq!(outcome_label::<()>(&Ok(())), "ok");
        let rejected: Result<(), EngineError> =
            Err(GameError::AlreadyActed("x".to_owned()).into());
        assert_eq!(outcome_label(&rejected), "already_acted");
        let faulted: Result<(), EngineError> =
            Err(EngineError::SessionFaulted(SessionId::new("s1")));
        assert_eq!(outcome_label(&faulted), "faulted");
    }

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_action::<()>("cast_vote", &Ok(()));
        record_action::<()>(
            "complete_task",
            &Err(GameError::NotFound("task".to_owned()).into()),
        );
        record_session_created();
        set_sessions_active(3);
        record_phase(Phase::Meeting);
        record_meeting(&MeetingReason::Emergency {
            caller: PlayerId::new("p1"),
        });
        record_tally(true);
        record_game_ended(Outcome {
            winner: Role::Majority,
            reason: WinReason::SaboteurEliminated,
        });
        record_persistence_failure(false);
        record_session_faulted();
    }
}
