//! Contract governor: gates every change to a contract's parameters.
//!
//! ```text
//!   NoQuestion ──propose──▶ QuestionOpen ──resolve (deadline passed)──▶ NoQuestion
//!                                │
//!                                └─ outcome recorded in history
//! ```
//!
//! At most one question is open per governed instance. A change is only
//! proposed after it validates against the parameter store, so a badly
//! typed change never opens a question. Resolution counts the votes,
//! applies the winning change set and closes the question inside one
//! `&mut self` call, so nobody observes the new values with the question
//! still open or the reverse.

use chrono::{DateTime, Duration, Utc};
use openescrow_types::{
    CommitteeId, EscrowError, GovernanceConfig, InstanceId, QuestionHandle, QuorumRule, Result,
};
use serde::Serialize;

use crate::{
    committee::{
        ClosingRule, Committee, ElectionType, Position, QuestionOutcome, QuestionSpec, VoterCap,
    },
    param::{ParamChanges, ParamStore, ParamValue},
};

/// How a parameter-change question ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ParamChangeOutcome {
    /// The change set was applied.
    Applied {
        question: QuestionHandle,
        changes: ParamChanges,
    },
    /// The status quo won the vote.
    Rejected { question: QuestionHandle },
    /// The question failed (e.g. quorum not met); nothing changed.
    Failed {
        question: QuestionHandle,
        reason: String,
    },
}

#[derive(Debug, Clone)]
struct OpenQuestion {
    handle: QuestionHandle,
    deadline: DateTime<Utc>,
}

#[derive(Debug)]
pub struct Governor {
    instance: InstanceId,
    committee: CommitteeId,
    params: ParamStore,
    voting_period: Duration,
    quorum: QuorumRule,
    open: Option<OpenQuestion>,
    history: Vec<ParamChangeOutcome>,
}

impl Governor {
    pub fn new(
        instance: InstanceId,
        params: ParamStore,
        committee: &Committee,
        config: &GovernanceConfig,
    ) -> Result<Self> {
        if config.voting_period_secs <= 0 {
            return Err(EscrowError::Configuration(format!(
                "voting period must be positive, got {}s",
                config.voting_period_secs
            )));
        }
        Ok(Self {
            instance,
            committee: committee.id(),
            params,
            voting_period: Duration::seconds(config.voting_period_secs),
            quorum: config.quorum,
            open: None,
            history: Vec::new(),
        })
    }

    #[must_use]
    pub fn params(&self) -> &ParamStore {
        &self.params
    }

    /// Current values of every governed parameter.
    #[must_use]
    pub fn governed_params(&self) -> std::collections::BTreeMap<String, ParamValue> {
        self.params.snapshot()
    }

    #[must_use]
    pub fn open_question(&self) -> Option<QuestionHandle> {
        self.open.as_ref().map(|q| q.handle)
    }

    #[must_use]
    pub fn history(&self) -> &[ParamChangeOutcome] {
        &self.history
    }

    /// A committee member proposes `changes`.
    pub fn propose(
        &mut self,
        committee: &mut Committee,
        cap: &VoterCap,
        changes: ParamChanges,
        now: DateTime<Utc>,
    ) -> Result<QuestionHandle> {
        if cap.committee() != self.committee {
            return Err(EscrowError::NotAVoter {
                voter: cap.voter(),
                committee: self.committee,
            });
        }
        self.open_question_for(committee, changes, now)
    }

    /// The contract's creator proposes `changes` through the governor.
    pub fn change_params(
        &mut self,
        committee: &mut Committee,
        changes: ParamChanges,
        now: DateTime<Utc>,
    ) -> Result<QuestionHandle> {
        self.open_question_for(committee, changes, now)
    }

    fn open_question_for(
        &mut self,
        committee: &mut Committee,
        changes: ParamChanges,
        now: DateTime<Utc>,
    ) -> Result<QuestionHandle> {
        if committee.id() != self.committee {
            return Err(EscrowError::Configuration(format!(
                "{} does not govern {}",
                committee.id(),
                self.instance
            )));
        }
        if let Some(open) = &self.open {
            return Err(EscrowError::QuestionAlreadyOpen(open.handle));
        }
        self.params.validate(&changes)?;

        let deadline = now + self.voting_period;
        let handle = committee.add_question(QuestionSpec {
            election_type: ElectionType::ParamChange,
            instance: self.instance,
            positions: vec![Position::NoChange, Position::Changes(changes)],
            closing_rule: ClosingRule { deadline },
            quorum: self.quorum,
        })?;
        self.open = Some(OpenQuestion { handle, deadline });
        Ok(handle)
    }

    /// Count the open question and apply its outcome.
    ///
    /// # Errors
    /// `NoQuestionOpen`, or `VotingStillOpen` before the deadline (the
    /// question stays open).
    pub fn resolve(&mut self, committee: &mut Committee, now: DateTime<Utc>) -> Result<ParamChangeOutcome> {
        let Some(open) = self.open.clone() else {
            return Err(EscrowError::NoQuestionOpen);
        };
        if now < open.deadline {
            return Err(EscrowError::VotingStillOpen(open.handle));
        }
        let outcome = match committee.outcome(open.handle, now)? {
            QuestionOutcome::Win(Position::Changes(changes)) => {
                self.params.apply(&changes)?;
                tracing::info!(
                    instance = %self.instance,
                    question = %open.handle,
                    params = ?changes.keys().collect::<Vec<_>>(),
                    "parameters changed"
                );
                ParamChangeOutcome::Applied {
                    question: open.handle,
                    changes,
                }
            }
            QuestionOutcome::Win(Position::NoChange) => {
                tracing::info!(instance = %self.instance, question = %open.handle, "change rejected by vote");
                ParamChangeOutcome::Rejected {
                    question: open.handle,
                }
            }
            QuestionOutcome::Failed { reason } => {
                tracing::warn!(instance = %self.instance, question = %open.handle, %reason, "question failed");
                ParamChangeOutcome::Failed {
                    question: open.handle,
                    reason,
                }
            }
        };
        self.open = None;
        self.history.push(outcome.clone());
        Ok(outcome)
    }
}
