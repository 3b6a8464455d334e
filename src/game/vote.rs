//! Vote collection and tally.
//!
//! One ballot per living participant per round. The tally runs as soon
//! as every living participant has voted.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::GameError;
use crate::game::model::{Participant, PlayerId, SessionId, Vote};

/// Result of resolving one round of votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tally {
    /// Votes received per target
    pub breakdown: BTreeMap<PlayerId, u32>,
    /// Abstentions
    pub skip: u32,
    /// Player voted out, if any
    pub eliminated: Option<PlayerId>,
}

/// Resolves ballots into an elimination or no elimination.
///
/// Let `max` be the highest count among all targets and skip. Skip
/// reaching `max` means no elimination; otherwise a single target at
/// `max` is eliminated; a tie between targets eliminates no one.
pub fn tally<'a>(ballots: impl IntoIterator<Item = &'a Option<PlayerId>>) -> Tally {
    let mut breakdown: BTreeMap<PlayerId, u32> = BTreeMap::new();
    let mut skip = 0;
    for ballot in ballots {
        match ballot {
            Some(target) => *breakdown.entry(target.clone()).or_default() += 1,
            None => skip += 1,
        }
    }

    let top = breakdown.values().copied().max().unwrap_or(0);
    let max = top.max(skip);

    let eliminated = if max == 0 || skip == max {
        None
    } else {
        let mut leaders = breakdown.iter().filter(|&(_, &count)| count == max);
        match (leaders.next(), leaders.next()) {
            (Some((target, _)), None) => Some(target.clone()),
            _ => None,
        }
    };

    Tally {
        breakdown,
        skip,
        eliminated,
    }
}

/// Progress of a vote after a ballot was accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BallotOutcome {
    /// More ballots are expected
    Recorded {
        /// Ballots cast so far this round
        cast: usize,
        /// Ballots needed to resolve
        needed: usize,
    },
    /// The last ballot arrived; votes have been tallied and cleared
    Resolved(Tally),
}

/// Ballots for the current round.
#[derive(Debug, Clone, Default)]
pub struct BallotBox {
    ballots: IndexMap<PlayerId, Option<PlayerId>>,
}

impl BallotBox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ballots cast so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ballots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ballots.is_empty()
    }

    #[must_use]
    pub fn has_voted(&self, voter: &PlayerId) -> bool {
        self.ballots.contains_key(voter)
    }

    /// Ballots as durable `Vote` records.
    #[must_use]
    pub fn votes(&self, session_id: &SessionId, round: u32) -> Vec<Vote> {
        self.ballots
            .iter()
            .map(|(voter, target)| Vote {
                session_id: session_id.clone(),
                round,
                voter_id: voter.clone(),
                target_id: target.clone(),
            })
            .collect()
    }

    /// Accepts one ballot and tallies once every living participant voted.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the voter or target is not in the session
    /// - `Unauthorized` if the voter is dead
    /// - `Validation` if the target is dead
    /// - `AlreadyActed` if the voter already voted this round
    pub fn cast(
        &mut self,
        participants: &IndexMap<PlayerId, Participant>,
        voter: &PlayerId,
        target: Option<&PlayerId>,
    ) -> Result<BallotOutcome, GameError> {
        let voter_entry = participants
            .get(voter)
            .ok_or_else(|| GameError::NotFound(format!("player {voter}")))?;
        if !voter_entry.is_alive {
            return Err(GameError::Unauthorized(format!(
                "player {voter} is eliminated and cannot vote"
            )));
        }

        if let Some(target) = target {
            let target_entry = participants
                .get(target)
                .ok_or_else(|| GameError::NotFound(format!("player {target}")))?;
            if !target_entry.is_alive {
                return Err(GameError::Validation(format!(
                    "player {target} is already eliminated"
                )));
            }
        }

        if self.has_voted(voter) {
            return Err(GameError::AlreadyActed(format!(
                "player {voter} already voted this round"
            )));
        }

        self.ballots.insert(voter.clone(), target.cloned());

        let needed = participants.values().filter(|p| p.is_alive).count();
        if self.ballots.len() >= needed {
            let result = tally(self.ballots.values());
            self.ballots.clear();
            Ok(BallotOutcome::Resolved(result))
        } else {
            Ok(BallotOutcome::Recorded {
                cast: self.ballots.len(),
                needed,
            })
        }
    }

    /// Drops every ballot.
    pub fn clear(&mut self) {
        self.ballots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::model::Role;

    fn pid(s: &str) -> PlayerId {
        PlayerId::new(s)
    }

    fn ballots(list: &[Option<&str>]) -> Vec<Option<PlayerId>> {
        list.iter().map(|b| b.map(pid)).collect()
    }

    fn roster(names: &[&str]) -> IndexMap<PlayerId, Participant> {
        names
            .iter()
            .map(|n| {
                (
                    pid(n),
                    Participant {
                        player_id: pid(n),
                        role: Role::Majority,
                        is_alive: true,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn tie_between_targets_eliminates_no_one() {
        let result = tally(&ballots(&[Some("a"), Some("b"), Some("a"), Some("b")]));
        assert_eq!(result.breakdown[&pid("a")], 2);
        assert_eq!(result.breakdown[&pid("b")], 2);
        assert_eq!(result.skip, 0);
        assert_eq!(result.eliminated, None);
    }

    #[test]
    fn skip_majority_eliminates_no_one() {
        let result = tally(&ballots(&[None, None, Some("a")]));
        assert_eq!(result.breakdown.len(), 1);
        assert_eq!(result.skip, 2);
        assert_eq!(result.eliminated, None);
    }

    #[test]
    fn skip_tied_with_target_eliminates_no_one() {
        let result = tally(&ballots(&[None, Some("a")]));
        assert_eq!(result.eliminated, None);
    }

    #[test]
    fn clear_leader_is_eliminated() {
        let result = tally(&ballots(&[Some("a"), Some("a"), Some("a"), Some("b")]));
        assert_eq!(result.eliminated, Some(pid("a")));
    }

    #[test]
    fn leader_beats_skip() {
        let result = tally(&ballots(&[Some("a"), Some("a"), None]));
        assert_eq!(result.eliminated, Some(pid("a")));
    }

    #[test]
    fn empty_ballots() {
        let result = tally(std::iter::empty::<&Option<PlayerId>>());
        assert_eq!(result.eliminated, None);
        assert_eq!(result.skip, 0);
    }

    #[test]
    fn resolves_when_everyone_alive_voted() {
        let players = roster(&["a", "b", "c"]);
        let mut urn = BallotBox::new();
        assert_eq!(
            urn.cast(&players, &pid("a"), Some(&pid("c"))).unwrap(),
            BallotOutcome::Recorded { cast: 1, needed: 3 }
        );
        urn.cast(&players, &pid("b"), Some(&pid("c"))).unwrap();
        let BallotOutcome::Resolved(result) = urn.cast(&players, &pid("c"), None).unwrap() else {
            panic!("expected resolution");
        };
        assert_eq!(result.eliminated, Some(pid("c")));
        assert!(urn.is_empty());
    }

    #[test]
    fn dead_players_do_not_count() {
        let mut players = roster(&["a", "b", "c"]);
        players.get_mut(&pid("c")).unwrap().is_alive = false;
        let mut urn = BallotBox::new();
        urn.cast(&players, &pid("a"), None).unwrap();
        assert!(matches!(
            urn.cast(&players, &pid("b"), None).unwrap(),
            BallotOutcome::Resolved(_)
        ));
    }

    #[test]
    fn rejects_duplicate_ballot() {
        let players = roster(&["a", "b", "c"]);
        let mut urn = BallotBox::new();
        urn.cast(&players, &pid("a"), None).unwrap();
        let err = urn.cast(&players, &pid("a"), Some(&pid("b"))).unwrap_err();
        assert!(matches!(err, GameError::AlreadyActed(_)));
        assert_eq!(urn.len(), 1);
    }

    #[test]
    fn rejects_dead_voter_and_dead_target() {
        let mut players = roster(&["a", "b", "c"]);
        players.get_mut(&pid("b")).unwrap().is_alive = false;
        let mut urn = BallotBox::new();
        assert!(matches!(
            urn.cast(&players, &pid("b"), None),
            Err(GameError::Unauthorized(_))
        ));
        assert!(matches!(
            urn.cast(&players, &pid("a"), Some(&pid("b"))),
            Err(GameError::Validation(_))
        ));
        assert!(matches!(
            urn.cast(&players, &pid("zed"), None),
            Err(GameError::NotFound(_))
        ));
        assert!(urn.is_empty());
    }

    #[test]
    fn votes_export() {
        let players = roster(&["a", "b", "c"]);
        let mut urn = BallotBox::new();
        urn.cast(&players, &pid("a"), Some(&pid("b"))).unwrap();
        let votes = urn.votes(&SessionId::new("s"), 2);
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].round, 2);
        assert_eq!(votes[0].target_id, Some(pid("b")));
    }
}
