//! System-wide constants for OpenEscrow.

/// Keyword under which swap fees are given and collected.
pub const FEE_KEYWORD: &str = "Fee";

/// Name of the governed fee parameter.
pub const FEE_PARAM: &str = "Fee";

/// Name of the governed parameter naming the contract's electorate.
pub const ELECTORATE_PARAM: &str = "Electorate";

/// Display precision of [`crate::Brand::fungible`] brands (IST uses 6).
pub const DEFAULT_DECIMAL_PLACES: u32 = 6;

/// Default voting window for a parameter-change question.
pub const DEFAULT_VOTING_PERIOD_SECS: i64 = 600;

/// Default weight of a committee voter.
pub const DEFAULT_VOTER_WEIGHT: u64 = 1;

/// Description of the invitation that opens a swap.
pub const CREATE_SWAP_DESC: &str = "create a swap";

/// Description of the invitation delivered to the second party.
pub const MATCH_OFFER_DESC: &str = "matchOffer";

/// Description of the fee collection invitation.
pub const COLLECT_FEES_DESC: &str = "collect fees";

/// Description of the ticket purchase invitation.
pub const BUY_TICKETS_DESC: &str = "buy tickets";

/// Keyword for ticket payment.
pub const PRICE_KEYWORD: &str = "Price";

/// Keyword for the ticket bag.
pub const TICKETS_KEYWORD: &str = "Tickets";
