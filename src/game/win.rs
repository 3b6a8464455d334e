//! Win condition evaluation.

use crate::game::model::{Outcome, Participant, Role, WinReason};

/// Decides whether the session is over.
///
/// Rules are checked in order and the first match wins:
/// 1. cipher fully decrypted → saboteurs
/// 2. no saboteur alive → majority
/// 3. alive players ≤ `survival_threshold` with a saboteur alive → saboteurs
#[must_use]
pub fn evaluate<'a>(
    decrypted_percentage: u32,
    participants: impl IntoIterator<Item = &'a Participant>,
    survival_threshold: usize,
) -> Option<Outcome> {
    if decrypted_percentage >= 100 {
        return Some(Outcome {
            winner: Role::Saboteur,
            reason: WinReason::DecryptionComplete,
        });
    }

    let mut alive = 0;
    let mut saboteurs_alive = 0;
    for p in participants.into_iter().filter(|p| p.is_alive) {
        alive += 1;
        if p.role == Role::Saboteur {
            saboteurs_alive += 1;
        }
    }

    if saboteurs_alive == 0 {
        return Some(Outcome {
            winner: Role::Majority,
            reason: WinReason::SaboteurEliminated,
        });
    }

    if alive <= survival_threshold {
        return Some(Outcome {
            winner: Role::Saboteur,
            reason: WinReason::Survival,
        });
    }

    None
}
