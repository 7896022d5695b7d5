//! # openescrow-engine
//!
//! **Escrow Plane**: seats, invitations, atomic rearrangement, and supply
//! conservation for one contract instance at a time.
//!
//! ## Architecture
//!
//! A [`ContractHost`] is the context object a contract runs inside. It:
//! 1. Issues single-use [`Invitation`]s bound to contract handlers
//! 2. Validates offers (invitation, shape, payments) before any mutation
//! 3. Escrows payments into a [`Seat`] (ACTIVE → EXITED | FAILED)
//! 4. Moves assets only through [`atomic_rearrange`], all-or-nothing
//! 5. Audits supply conservation and halts on a violation
//!
//! All state is owned by the host and mutated through `&mut self`, so an
//! offer or a rearrangement is never observed half-applied.

pub mod conservation;
pub mod host;
pub mod invitation;
pub mod ledger;
pub mod rearrange;
pub mod seat;

pub use conservation::SupplyConservation;
pub use host::{ContractHost, Offer};
pub use invitation::{Invitation, InvitationDetails, InvitationRegistry};
pub use ledger::{SeatLedger, check_payments};
pub use rearrange::{RearrangementReceipt, TransferPart, atomic_rearrange, compute_rearrangement_digest};
pub use seat::{Payout, Seat, SeatState};
