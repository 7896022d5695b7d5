//! Escrow positions ("seats").
//!
//! ## State Machine
//!
//! ```text
//!   ┌────────┐  exit / expire  ┌────────┐
//!   │ ACTIVE ├────────────────▶│ EXITED │
//!   └───┬────┘                 └────────┘
//!       │ fail
//!       ▼
//!   ┌────────┐
//!   │ FAILED │
//!   └────────┘
//! ```
//!
//! Both terminal states are final: an exited or failed seat is never
//! rearranged again and its allocation has been paid out.

use std::fmt;

use openescrow_types::{AmountMap, EscrowError, Proposal, Result, SeatId};
use serde::Serialize;

/// Lifecycle state of a seat. Transitions are monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SeatState {
    /// Holding assets; may take part in rearrangements.
    Active,
    /// Exited normally (settled, cancelled, or expired).
    Exited,
    /// Exited with a diagnostic reason.
    Failed,
}

impl SeatState {
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!((self, target), (Self::Active, Self::Exited | Self::Failed))
    }
}

impl fmt::Display for SeatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Exited => write!(f, "EXITED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// One party's stake in a pending exchange.
#[derive(Debug, Clone, Serialize)]
pub struct Seat {
    pub id: SeatId,
    /// The terms submitted with the offer.
    pub proposal: Proposal,
    /// Current holdings. Starts as the deposited `give`; changed only by the
    /// rearrangement engine and by payout.
    pub(crate) allocation: AmountMap,
    pub(crate) state: SeatState,
    /// Shared diagnostic when the seat failed.
    pub(crate) failure: Option<String>,
}

impl Seat {
    pub(crate) fn new(id: SeatId, proposal: Proposal, allocation: AmountMap) -> Self {
        Self {
            id,
            proposal,
            allocation,
            state: SeatState::Active,
            failure: None,
        }
    }

    #[must_use]
    pub fn allocation(&self) -> &AmountMap {
        &self.allocation
    }

    #[must_use]
    pub fn state(&self) -> SeatState {
        self.state
    }

    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == SeatState::Active
    }

    pub fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(EscrowError::SeatNotActive {
                seat: self.id,
                state: self.state.to_string(),
            })
        }
    }

    /// Move to a terminal state, handing back the allocation for payout.
    pub(crate) fn close(&mut self, target: SeatState, failure: Option<String>) -> Result<AmountMap> {
        if !self.state.can_transition_to(target) {
            return Err(EscrowError::SeatNotActive {
                seat: self.id,
                state: self.state.to_string(),
            });
        }
        self.state = target;
        self.failure = failure;
        Ok(std::mem::take(&mut self.allocation))
    }
}

/// What a party receives when its seat exits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payout {
    pub seat: SeatId,
    pub amounts: AmountMap,
    /// Present when the seat failed.
    pub failure: Option<String>,
}
