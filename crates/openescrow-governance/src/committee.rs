//! Committee electorate.
//!
//! A committee is a fixed list of weighted voters. Each voter's right to
//! vote is a [`VoterCap`] capability, claimed once; votes are cast with the
//! capability, never with a bare identity. Questions are published in order
//! and can be looked up by handle or as the latest one.

use chrono::{DateTime, Utc};
use openescrow_types::{
    CommitteeConfig, CommitteeId, EscrowError, InstanceId, QuestionHandle, QuorumRule, Result,
    VoterId,
};
use serde::Serialize;

use crate::{
    counter::{CountOutcome, Tally, VoteCounter},
    param::ParamChanges,
};

/// Capability to vote on a committee's questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoterCap {
    committee: CommitteeId,
    voter: VoterId,
}

impl VoterCap {
    #[must_use]
    pub fn committee(&self) -> CommitteeId {
        self.committee
    }

    #[must_use]
    pub fn voter(&self) -> VoterId {
        self.voter
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Voter {
    pub id: VoterId,
    pub name: String,
    pub weight: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ElectionType {
    /// Change governed parameters of a contract instance.
    ParamChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClosingRule {
    pub deadline: DateTime<Utc>,
}

/// A candidate outcome of a parameter-change question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Position {
    NoChange,
    Changes(ParamChanges),
}

/// What a question asks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionSpec {
    pub election_type: ElectionType,
    /// Instance whose parameters are at issue.
    pub instance: InstanceId,
    /// Candidate outcomes in declaration order. Ties go to the first.
    pub positions: Vec<Position>,
    pub closing_rule: ClosingRule,
    pub quorum: QuorumRule,
}

/// A published question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionDetails {
    pub handle: QuestionHandle,
    pub committee: CommitteeId,
    pub spec: QuestionSpec,
}

/// Outcome reported once a question is counted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum QuestionOutcome {
    Win(Position),
    Failed { reason: String },
}

#[derive(Debug)]
struct QuestionRecord {
    details: QuestionDetails,
    counter: VoteCounter,
}

#[derive(Debug)]
pub struct Committee {
    id: CommitteeId,
    name: String,
    voters: Vec<Voter>,
    claimed: Vec<bool>,
    questions: Vec<QuestionRecord>,
}

impl Committee {
    /// Committee with `(name, weight)` voters, numbered from zero.
    pub fn new<'a>(name: impl Into<String>, voters: impl IntoIterator<Item = (&'a str, u64)>) -> Self {
        let voters: Vec<Voter> = voters
            .into_iter()
            .zip(0u32..)
            .map(|((name, weight), i)| Voter {
                id: VoterId(i),
                name: name.to_string(),
                weight,
            })
            .collect();
        let committee = Self {
            id: CommitteeId::new(),
            name: name.into(),
            claimed: vec![false; voters.len()],
            voters,
            questions: Vec::new(),
        };
        tracing::info!(committee = %committee.id, name = %committee.name, voters = committee.voters.len(), "committee formed");
        committee
    }

    pub fn from_config(config: &CommitteeConfig) -> Result<Self> {
        if config.voters.is_empty() {
            return Err(EscrowError::Configuration(format!(
                "committee {} has no voters",
                config.name
            )));
        }
        Ok(Self::new(
            config.name.clone(),
            config.voters.iter().map(|v| (v.name.as_str(), v.weight)),
        ))
    }

    #[must_use]
    pub fn id(&self) -> CommitteeId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn voters(&self) -> &[Voter] {
        &self.voters
    }

    /// Claim the voting capability of voter `index`. Each capability is
    /// handed out once; later claims return `None`.
    pub fn claim_voter_cap(&mut self, index: usize) -> Option<VoterCap> {
        let claimed = self.claimed.get_mut(index)?;
        if *claimed {
            return None;
        }
        *claimed = true;
        Some(VoterCap {
            committee: self.id,
            voter: self.voters[index].id,
        })
    }

    /// Publish a question and start counting.
    ///
    /// # Errors
    /// `Configuration` if fewer than two positions are offered.
    pub fn add_question(&mut self, spec: QuestionSpec) -> Result<QuestionHandle> {
        if spec.positions.len() < 2 {
            return Err(EscrowError::Configuration(
                "a question needs at least two positions".to_string(),
            ));
        }
        let handle = QuestionHandle::deterministic(
            self.id,
            u64::try_from(self.questions.len()).unwrap_or(u64::MAX),
        );
        let counter = VoteCounter::new(
            handle,
            spec.positions.len(),
            spec.closing_rule.deadline,
            spec.quorum,
            self.voters.len(),
        );
        tracing::info!(
            committee = %self.id,
            question = %handle,
            instance = %spec.instance,
            deadline = %spec.closing_rule.deadline,
            "question opened"
        );
        self.questions.push(QuestionRecord {
            details: QuestionDetails {
                handle,
                committee: self.id,
                spec,
            },
            counter,
        });
        Ok(handle)
    }

    fn record_mut(&mut self, handle: QuestionHandle) -> Result<&mut QuestionRecord> {
        self.questions
            .iter_mut()
            .find(|q| q.details.handle == handle)
            .ok_or(EscrowError::QuestionNotFound(handle))
    }

    pub fn question(&self, handle: QuestionHandle) -> Result<&QuestionDetails> {
        self.questions
            .iter()
            .find(|q| q.details.handle == handle)
            .map(|q| &q.details)
            .ok_or(EscrowError::QuestionNotFound(handle))
    }

    /// The most recently published question.
    #[must_use]
    pub fn latest_question(&self) -> Option<&QuestionDetails> {
        self.questions.last().map(|q| &q.details)
    }

    /// Vote for position `position` of question `handle`.
    pub fn cast_vote(
        &mut self,
        cap: &VoterCap,
        handle: QuestionHandle,
        position: usize,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if cap.committee != self.id {
            return Err(EscrowError::NotAVoter {
                voter: cap.voter,
                committee: self.id,
            });
        }
        let weight = self
            .voters
            .iter()
            .find(|v| v.id == cap.voter)
            .map(|v| v.weight)
            .ok_or(EscrowError::NotAVoter {
                voter: cap.voter,
                committee: self.id,
            })?;
        self.record_mut(handle)?
            .counter
            .submit_vote(cap.voter, position, weight, now)
    }

    /// Count question `handle` and report its outcome.
    pub fn outcome(&mut self, handle: QuestionHandle, now: DateTime<Utc>) -> Result<QuestionOutcome> {
        let record = self.record_mut(handle)?;
        let Tally { outcome, .. } = record.counter.tally(now)?;
        Ok(match outcome {
            CountOutcome::Win(i) => match record.details.spec.positions.get(i) {
                Some(position) => QuestionOutcome::Win(position.clone()),
                None => QuestionOutcome::Failed {
                    reason: format!("winning position {i} out of range"),
                },
            },
            CountOutcome::Failed { reason } => QuestionOutcome::Failed { reason },
        })
    }

    /// Full count of question `handle`, once it has been tallied.
    pub fn tally(&self, handle: QuestionHandle) -> Result<Option<&Tally>> {
        self.questions
            .iter()
            .find(|q| q.details.handle == handle)
            .map(|q| q.counter.result())
            .ok_or(EscrowError::QuestionNotFound(handle))
    }
}
