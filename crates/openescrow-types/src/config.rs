//! Deployment configuration: swap terms, governance timing, committee
//! membership, ticket inventory.
//!
//! Brands are referenced by issuer name and resolved at start time through the
//! issuer registry, so configuration never carries a brand identity.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{EscrowError, Result, constants};

/// Terms fixed when the swap contract starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapTerms {
    /// Issuer name of the fee brand (e.g. `"IST"`).
    pub fee_brand: String,
    /// Initial fee in display units of the fee brand.
    pub initial_fee: Decimal,
    /// Keyword the first party must give the fee under.
    #[serde(default = "default_fee_keyword")]
    pub fee_keyword: String,
}

fn default_fee_keyword() -> String {
    constants::FEE_KEYWORD.to_string()
}

/// How many voters must take part for a question to carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuorumRule {
    /// Any number of ballots, including none.
    NoQuorum,
    /// Strictly more than half of the committee's voters.
    #[default]
    Majority,
    /// Every voter.
    All,
}

impl QuorumRule {
    /// Whether `ballots` out of `electorate_size` voters meet the rule.
    #[must_use]
    pub fn is_met(self, ballots: usize, electorate_size: usize) -> bool {
        match self {
            Self::NoQuorum => true,
            Self::Majority => ballots * 2 > electorate_size,
            Self::All => ballots == electorate_size,
        }
    }
}

/// Timing and quorum for parameter-change questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    #[serde(default = "default_voting_period")]
    pub voting_period_secs: i64,
    #[serde(default)]
    pub quorum: QuorumRule,
}

fn default_voting_period() -> i64 {
    constants::DEFAULT_VOTING_PERIOD_SECS
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            voting_period_secs: constants::DEFAULT_VOTING_PERIOD_SECS,
            quorum: QuorumRule::default(),
        }
    }
}

/// One committee seat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterConfig {
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: u64,
}

fn default_weight() -> u64 {
    constants::DEFAULT_VOTER_WEIGHT
}

/// Committee membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitteeConfig {
    pub name: String,
    pub voters: Vec<VoterConfig>,
}

/// One kind of ticket for sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketKindConfig {
    pub name: String,
    /// Price per ticket in display units of the price brand.
    pub price: Decimal,
    pub supply: u64,
}

/// Inventory of the ticket sale contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketInventoryConfig {
    pub price_brand: String,
    pub kinds: Vec<TicketKindConfig>,
}

/// Everything needed to deploy a governed swap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub swap: SwapTerms,
    #[serde(default)]
    pub governance: GovernanceConfig,
    pub committee: CommitteeConfig,
}

impl DeploymentConfig {
    /// Parse and validate a JSON deployment config.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.swap.initial_fee.is_sign_negative() {
            return Err(EscrowError::Configuration(format!(
                "initial_fee must be non-negative, got {}",
                self.swap.initial_fee
            )));
        }
        if self.governance.voting_period_secs <= 0 {
            return Err(EscrowError::Configuration(
                "voting_period_secs must be positive".to_string(),
            ));
        }
        if self.committee.voters.is_empty() {
            return Err(EscrowError::Configuration(format!(
                "committee {} has no voters",
                self.committee.name
            )));
        }
        Ok(())
    }
}

impl TicketInventoryConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        if config.kinds.is_empty() {
            return Err(EscrowError::Configuration(
                "ticket inventory has no kinds".to_string(),
            ));
        }
        Ok(config)
    }
}
