//! Vote counter for one question.
//!
//! Policy:
//! - **Last vote counts.** A voter may vote any number of times before the
//!   deadline; each ballot replaces that voter's previous one.
//! - Ballots are accepted while `now < deadline`; tallying is allowed once
//!   `now >= deadline`.
//! - The position with strictly the most weight wins. On a tie the
//!   earliest-declared position wins.
//! - If the quorum rule is not met the question fails and no position wins.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use openescrow_types::{EscrowError, QuestionHandle, QuorumRule, Result, VoterId};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ballot {
    pub position: usize,
    pub weight: u64,
}

/// What a closed question decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CountOutcome {
    /// Index of the winning position.
    Win(usize),
    /// No position carried.
    Failed { reason: String },
}

/// Final count of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tally {
    /// Total weight per position, in declaration order.
    pub totals: Vec<u64>,
    pub ballots: usize,
    pub outcome: CountOutcome,
}

#[derive(Debug, Clone)]
pub struct VoteCounter {
    question: QuestionHandle,
    positions: usize,
    deadline: DateTime<Utc>,
    quorum: QuorumRule,
    electorate_size: usize,
    ballots: BTreeMap<VoterId, Ballot>,
    result: Option<Tally>,
}

impl VoteCounter {
    #[must_use]
    pub fn new(
        question: QuestionHandle,
        positions: usize,
        deadline: DateTime<Utc>,
        quorum: QuorumRule,
        electorate_size: usize,
    ) -> Self {
        Self {
            question,
            positions,
            deadline,
            quorum,
            electorate_size,
            ballots: BTreeMap::new(),
            result: None,
        }
    }

    #[must_use]
    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    #[must_use]
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        now < self.deadline
    }

    /// Record `voter`'s ballot, replacing any earlier one.
    pub fn submit_vote(
        &mut self,
        voter: VoterId,
        position: usize,
        weight: u64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !self.is_open(now) {
            return Err(EscrowError::VotingClosed(self.question));
        }
        if position >= self.positions {
            return Err(EscrowError::InvalidPosition {
                question: self.question,
                index: position,
            });
        }
        let previous = self.ballots.insert(voter, Ballot { position, weight });
        if let Some(prev) = previous {
            tracing::debug!(
                question = %self.question,
                %voter,
                from = prev.position,
                to = position,
                "ballot replaced"
            );
        } else {
            tracing::debug!(question = %self.question, %voter, position, weight, "ballot recorded");
        }
        Ok(())
    }

    #[must_use]
    pub fn ballot(&self, voter: VoterId) -> Option<Ballot> {
        self.ballots.get(&voter).copied()
    }

    /// Count the ballots. The result is fixed by the first call.
    ///
    /// # Errors
    /// [`EscrowError::VotingStillOpen`] before the deadline.
    pub fn tally(&mut self, now: DateTime<Utc>) -> Result<Tally> {
        if let Some(done) = &self.result {
            return Ok(done.clone());
        }
        if self.is_open(now) {
            return Err(EscrowError::VotingStillOpen(self.question));
        }

        let mut totals = vec![0u64; self.positions];
        for ballot in self.ballots.values() {
            totals[ballot.position] = totals[ballot.position].saturating_add(ballot.weight);
        }

        let outcome = if self.quorum.is_met(self.ballots.len(), self.electorate_size) {
            let mut winner = 0;
            for (i, weight) in totals.iter().enumerate() {
                if *weight > totals[winner] {
                    winner = i;
                }
            }
            CountOutcome::Win(winner)
        } else {
            CountOutcome::Failed {
                reason: format!(
                    "quorum {:?} not met: {} of {} voters",
                    self.quorum,
                    self.ballots.len(),
                    self.electorate_size
                ),
            }
        };

        let tally = Tally {
            totals,
            ballots: self.ballots.len(),
            outcome,
        };
        tracing::info!(question = %self.question, outcome = ?tally.outcome, "question tallied");
        self.result = Some(tally.clone());
        Ok(tally)
    }

    #[must_use]
    pub fn result(&self) -> Option<&Tally> {
        self.result.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use openescrow_types::CommitteeId;

    use super::*;

    fn counter(quorum: QuorumRule, electorate: usize) -> (VoteCounter, DateTime<Utc>) {
        let now = Utc::now();
        let q = QuestionHandle::deterministic(CommitteeId::new(), 0);
        (
            VoteCounter::new(q, 2, now + Duration::seconds(10), quorum, electorate),
            now,
        )
    }

    #[test]
    fn heavier_position_wins() {
        let (mut c, now) = counter(QuorumRule::Majority, 2);
        c.submit_vote(VoterId(0), 0, 0, now).unwrap();
        c.submit_vote(VoterId(1), 1, 1, now).unwrap();
        let tally = c.tally(c.deadline()).unwrap();
        assert_eq!(tally.totals, vec![0, 1]);
        assert_eq!(tally.outcome, CountOutcome::Win(1));
    }

    #[test]
    fn tie_goes_to_earliest_position() {
        let (mut c, now) = counter(QuorumRule::Majority, 2);
        c.submit_vote(VoterId(0), 1, 1, now).unwrap();
        c.submit_vote(VoterId(1), 0, 1, now).unwrap();
        let tally = c.tally(c.deadline()).unwrap();
        assert_eq!(tally.outcome, CountOutcome::Win(0));
    }

    #[test]
    fn last_vote_counts() {
        let (mut c, now) = counter(QuorumRule::NoQuorum, 1);
        c.submit_vote(VoterId(0), 0, 1, now).unwrap();
        c.submit_vote(VoterId(0), 1, 1, now + Duration::seconds(1)).unwrap();
        assert_eq!(c.ballot(VoterId(0)).unwrap().position, 1);
        let tally = c.tally(c.deadline()).unwrap();
        assert_eq!(tally.ballots, 1);
        assert_eq!(tally.outcome, CountOutcome::Win(1));
    }

    #[test]
    fn deadline_boundaries() {
        let (mut c, now) = counter(QuorumRule::NoQuorum, 1);
        let deadline = c.deadline();
        assert!(matches!(
            c.tally(deadline - Duration::seconds(1)),
            Err(EscrowError::VotingStillOpen(_))
        ));
        assert!(matches!(
            c.submit_vote(VoterId(0), 0, 1, deadline),
            Err(EscrowError::VotingClosed(_))
        ));
        assert!(c.submit_vote(VoterId(0), 0, 1, now).is_ok());
        assert!(c.tally(deadline).is_ok());
    }

    #[test]
    fn invalid_position_rejected() {
        let (mut c, now) = counter(QuorumRule::NoQuorum, 1);
        assert!(matches!(
            c.submit_vote(VoterId(0), 2, 1, now),
            Err(EscrowError::InvalidPosition { index: 2, .. })
        ));
    }

    #[test]
    fn quorum_not_met_fails() {
        let (mut c, now) = counter(QuorumRule::Majority, 3);
        c.submit_vote(VoterId(0), 1, 5, now).unwrap();
        let tally = c.tally(c.deadline()).unwrap();
        assert!(matches!(tally.outcome, CountOutcome::Failed { .. }));
    }

    #[test]
    fn tally_is_final() {
        let (mut c, now) = counter(QuorumRule::NoQuorum, 1);
        c.submit_vote(VoterId(0), 1, 1, now).unwrap();
        let first = c.tally(c.deadline()).unwrap();
        let again = c.tally(c.deadline() + Duration::days(1)).unwrap();
        assert_eq!(first, again);
        assert_eq!(c.result(), Some(&first));
    }

    #[test]
    fn tally_serializes() {
        let (mut c, _) = counter(QuorumRule::NoQuorum, 0);
        let tally = c.tally(c.deadline()).unwrap();
        let json = serde_json::to_string(&tally).unwrap();
        assert!(json.contains("Win"));
    }
}
