//! # openescrow-governance
//!
//! **Governance Plane**: governed parameters and the committee vote that
//! changes them.
//!
//! ## Flow
//!
//! 1. A committee member (holding a [`VoterCap`]) or the contract's creator
//!    proposes a change set to the contract's [`Governor`]
//! 2. The change is validated against the [`ParamStore`]'s declared types;
//!    a valid change opens one question on the [`Committee`]
//! 3. Voters cast weighted ballots until the deadline (last vote counts)
//! 4. After the deadline the governor resolves the question: the
//!    [`VoteCounter`] picks the heaviest position (ties go to "no change")
//!    and the winning values are applied as the question closes
//!
//! Settlement code reads parameters through [`ParamStore`] getters and
//! never writes them.

pub mod committee;
pub mod counter;
pub mod governor;
pub mod param;

pub use committee::{
    ClosingRule, Committee, ElectionType, Position, QuestionDetails, QuestionOutcome, QuestionSpec,
    Voter, VoterCap,
};
pub use counter::{Ballot, CountOutcome, Tally, VoteCounter};
pub use governor::{Governor, ParamChangeOutcome};
pub use param::{ParamChanges, ParamEntry, ParamStore, ParamType, ParamValue};
