//! Proposals: what a party offers, what it wants, and when it may leave.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{AmountMap, EscrowError, Result};

/// When a seat may be exited by its owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ExitRule {
    /// The owner may exit at any time.
    #[default]
    OnDemand,
    /// The owner gives up the right to exit; only the contract exits the seat.
    Waived,
    /// The seat is exited automatically once the deadline has passed.
    AfterDeadline(DateTime<Utc>),
}

impl fmt::Display for ExitRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnDemand => write!(f, "onDemand"),
            Self::Waived => write!(f, "waived"),
            Self::AfterDeadline(t) => write!(f, "afterDeadline({})", t.to_rfc3339()),
        }
    }
}

/// A party's terms for an exchange.
///
/// `give` is deposited into escrow when the proposal is submitted; `want` is
/// informational for the contract's matching logic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Proposal {
    pub give: AmountMap,
    pub want: AmountMap,
    pub exit: ExitRule,
}

impl Proposal {
    #[must_use]
    pub fn new(give: AmountMap, want: AmountMap) -> Self {
        Self {
            give,
            want,
            exit: ExitRule::OnDemand,
        }
    }

    #[must_use]
    pub fn with_exit(mut self, exit: ExitRule) -> Self {
        self.exit = exit;
        self
    }

    /// A keyword names one side of the exchange only.
    ///
    /// # Errors
    /// [`EscrowError::ShapeMismatch`] naming the first keyword found in both
    /// `give` and `want`.
    pub fn validate(&self) -> Result<()> {
        match self.give.keys().find(|k| self.want.contains_key(*k)) {
            Some(keyword) => Err(EscrowError::ShapeMismatch {
                reason: format!("keyword {keyword} appears in both give and want"),
            }),
            None => Ok(()),
        }
    }
}
