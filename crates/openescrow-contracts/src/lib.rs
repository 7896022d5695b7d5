//! # openescrow-contracts
//!
//! Contracts built on the escrow engine:
//!
//! - [`SwapContract`]: two-party swap with a governed fee, fee collection
//!   and invitation delivery through an [`AddressDirectory`]
//! - [`TicketSale`]: sells a bag-valued inventory for a fungible price
//!
//! plus the collaborators they resolve through: [`IssuerRegistry`] for
//! brands and [`InMemoryDirectory`] for deposit addresses.

pub mod directory;
pub mod issuers;
pub mod swap;
pub mod tickets;

pub use directory::{AddressDirectory, InMemoryDirectory};
pub use issuers::IssuerRegistry;
pub use swap::{OfferOutcome, OfferResult, SwapContract, SwapHandler, second_give_shape, swap_with_fee};
pub use tickets::{TicketHandler, TicketSale, bag_price};
