//! Role assignment.
//!
//! Picks `saboteur_count` players uniformly at random from the roster;
//! everyone else joins the majority.

use rand::Rng;
use rand::seq::index;

use crate::error::GameError;
use crate::game::model::{Participant, PlayerId, Role};

/// Smallest roster a session can start with.
pub const MIN_PLAYERS: usize = 2;

/// Assigns roles to `roster`, preserving roster order.
///
/// # Errors
///
/// Returns `GameError::Validation` if the roster has fewer than
/// [`MIN_PLAYERS`] players, contains duplicates, or if `saboteur_count`
/// is zero or would leave no majority player.
pub fn assign_roles<R: Rng + ?Sized>(
    roster: &[PlayerId],
    saboteur_count: usize,
    rng: &mut R,
) -> Result<Vec<Participant>, GameError> {
    if roster.len() < MIN_PLAYERS {
        return Err(GameError::Validation(format!(
            "roster needs at least {MIN_PLAYERS} players, got {}",
            roster.len()
        )));
    }
    if saboteur_count == 0 || saboteur_count >= roster.len() {
        return Err(GameError::Validation(format!(
            "saboteur count {saboteur_count} invalid for a roster of {}",
            roster.len()
        )));
    }
    let mut seen = std::collections::HashSet::with_capacity(roster.len());
    if let Some(dup) = roster.iter().find(|p| !seen.insert(*p)) {
        return Err(GameError::Validation(format!(
            "player {dup} appears twice in the roster"
        )));
    }

    let picked = index::sample(rng, roster.len(), saboteur_count);
    let mut participants: Vec<Participant> = roster
        .iter()
        .map(|player_id| Participant {
            player_id: player_id.clone(),
            role: Role::Majority,
            is_alive: true,
        })
        .collect();
    for i in picked {
        participants[i].role = Role::Saboteur;
    }

    Ok(participants)
}
