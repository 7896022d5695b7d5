//! # openescrow-types
//!
//! Shared types, errors, and configuration for **OpenEscrow**.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`BrandId`], [`InstanceId`], [`SeatId`], [`InvitationId`], [`CommitteeId`], [`VoterId`], [`QuestionHandle`]
//! - **Amount algebra**: [`Brand`], [`AssetKind`], [`Amount`], [`AmountValue`], [`AmountMap`]
//! - **Proposals**: [`Proposal`], [`ExitRule`]
//! - **Shapes**: [`Shape`], [`ProposalShape`], [`ExitShape`]
//! - **Configuration**: [`DeploymentConfig`], [`SwapTerms`], [`GovernanceConfig`], [`CommitteeConfig`], [`TicketInventoryConfig`]
//! - **Errors**: [`EscrowError`] with `OE_ERR_` prefix codes
//! - **Constants**: keywords, parameter names, defaults

pub mod amount;
pub mod brand;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod proposal;
pub mod shape;

pub use amount::*;
pub use brand::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use proposal::*;
pub use shape::*;

// Constants are accessed via `openescrow_types::constants::FOO`.
