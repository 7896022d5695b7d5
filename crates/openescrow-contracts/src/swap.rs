//! Governed two-party swap with a fee.
//!
//! ## Protocol
//!
//! ```text
//!   first party                    contract                     second party
//!   ───────────                    ────────                     ────────────
//!   make_first_invitation ───────▶ "create a swap"
//!   offer(give incl. Fee) ───────▶ seat #1 opened
//!                                  "matchOffer" ───deposit────▶ inbox
//!                                                  ◀─────────── offer(give)
//!                                  shape check: give ⊨ first want
//!                                  ├─ match:    3-leg rearrangement, both exit
//!                                  └─ mismatch: both seats fail, same reason
//! ```
//!
//! The fee is the governed `Fee` parameter. It is read when an invitation is
//! made (for the first party's shape) and again at settlement (for the fee
//! leg), so a parameter change affects only swaps settled after it.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use openescrow_engine::{
    ContractHost, Invitation, InvitationDetails, Payout, RearrangementReceipt, Seat, TransferPart,
};
use openescrow_governance::{
    Committee, Governor, ParamChangeOutcome, ParamChanges, ParamStore, ParamType, ParamValue,
    VoterCap,
};
use openescrow_types::{
    Amount, AmountMap, AmountValue, Brand, EscrowError, GovernanceConfig, InstanceId, Proposal,
    ProposalShape, QuestionHandle, Result, SeatId, Shape, Subject, SwapTerms, constants,
};
use serde::Serialize;

use crate::{directory::AddressDirectory, issuers::IssuerRegistry};

/// What redeeming a swap invitation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SwapHandler {
    /// Open the first party's seat and send a match invitation.
    CreateSwap,
    /// Settle against the first party's seat.
    MatchOffer { first_seat: SeatId },
    /// Sweep the fee seat to the collector.
    CollectFees,
}

/// Result of a successful offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OfferResult {
    /// The match invitation was delivered to the counterparty.
    InvitationSent { address: String },
    /// Both seats settled and exited.
    Settled {
        receipt: RearrangementReceipt,
        first: Payout,
        second: Payout,
    },
    /// Accumulated fees were paid out to the collector.
    FeesCollected(Payout),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfferOutcome {
    pub seat: SeatId,
    pub result: OfferResult,
}

#[derive(Debug)]
pub struct SwapContract<D> {
    host: ContractHost<SwapHandler>,
    issuers: IssuerRegistry,
    fee_brand: Brand,
    fee_keyword: String,
    fee_seat: SeatId,
    governor: Governor,
    directory: D,
    /// First seats still waiting for their match invitation.
    awaiting_match: BTreeSet<SeatId>,
}

impl<D: AddressDirectory> SwapContract<D> {
    /// Start an instance governed by `committee`.
    ///
    /// # Errors
    /// `UnknownIssuer` if the fee brand is not registered, `InvalidAmount`
    /// if the initial fee cannot be represented, `Configuration` for bad
    /// governance settings.
    pub fn start(
        terms: &SwapTerms,
        governance: &GovernanceConfig,
        issuers: IssuerRegistry,
        committee: &Committee,
        directory: D,
    ) -> Result<Self> {
        let fee_brand = issuers.resolve(&terms.fee_brand)?;
        let initial_fee = Amount::from_display(&fee_brand, terms.initial_fee)?;

        let mut params = ParamStore::new();
        params.declare(
            constants::FEE_PARAM,
            ParamType::Amount(fee_brand.clone()),
            ParamValue::Amount(initial_fee.clone()),
        )?;
        params.declare(
            constants::ELECTORATE_PARAM,
            ParamType::String,
            ParamValue::String(committee.id().to_string()),
        )?;

        let mut host = ContractHost::new();
        let fee_seat = host.make_empty_seat()?;
        let governor = Governor::new(host.instance(), params, committee, governance)?;
        tracing::info!(
            instance = %host.instance(),
            fee = %initial_fee,
            committee = %committee.id(),
            "swap contract started"
        );
        Ok(Self {
            host,
            issuers,
            fee_brand,
            fee_keyword: terms.fee_keyword.clone(),
            fee_seat,
            governor,
            directory,
            awaiting_match: BTreeSet::new(),
        })
    }

    #[must_use]
    pub fn instance(&self) -> InstanceId {
        self.host.instance()
    }

    // =====================================================================
    // Public facet
    // =====================================================================

    /// Invitation to open a swap. Brands in `issuers` not yet known to the
    /// instance are saved.
    pub fn make_first_invitation(&mut self, issuers: &[Brand]) -> Result<Invitation> {
        for brand in issuers {
            if !self.issuers.contains(brand) {
                self.issuers.save(brand);
            }
        }
        let fee = self.current_fee()?;
        let min = fee.as_nat().ok_or_else(|| {
            EscrowError::Internal(format!("fee {fee} is not a fungible amount"))
        })?;
        let shape = ProposalShape::give(Shape::split_record([(
            self.fee_keyword.clone(),
            Shape::NatRange {
                brand: self.fee_brand.clone(),
                min,
                max: None,
            },
        )]));
        self.host.make_invitation(
            constants::CREATE_SWAP_DESC,
            SwapHandler::CreateSwap,
            Some(shape),
            None,
        )
    }

    /// Redeem any invitation of this instance.
    ///
    /// `counterparty` is the second party's address and is required when
    /// redeeming a "create a swap" invitation. Every brand in the proposal
    /// must be registered with the instance (`UnknownIssuer` otherwise).
    pub fn offer(
        &mut self,
        invitation: &Invitation,
        proposal: Proposal,
        payments: AmountMap,
        counterparty: Option<&str>,
    ) -> Result<OfferOutcome> {
        let address = match self.host.pending_handler(invitation)? {
            SwapHandler::CreateSwap => {
                let address = counterparty
                    .ok_or_else(|| EscrowError::UnknownAddress("<none>".to_string()))?;
                if !self.directory.knows(address) {
                    return Err(EscrowError::UnknownAddress(address.to_string()));
                }
                address.to_string()
            }
            SwapHandler::MatchOffer { .. } | SwapHandler::CollectFees => String::new(),
        };
        if let Some(amount) = proposal
            .give
            .values()
            .chain(proposal.want.values())
            .find(|amount| !self.issuers.contains(amount.brand()))
        {
            return Err(EscrowError::UnknownIssuer(amount.brand().name().to_string()));
        }

        let offer = self.host.offer(invitation, proposal, payments)?;
        let seat = offer.seat;
        let result = match offer.handler {
            SwapHandler::CreateSwap => {
                self.awaiting_match.insert(seat);
                if let Err(err) = self.make_second_invitation(seat, &address) {
                    self.awaiting_match.remove(&seat);
                    if self.host.seat(seat).is_ok_and(Seat::is_active) {
                        self.host.fail_seat(seat, err.to_string())?;
                    }
                    return Err(err);
                }
                OfferResult::InvitationSent { address }
            }
            SwapHandler::MatchOffer { first_seat } => self.match_offer(first_seat, seat)?,
            SwapHandler::CollectFees => OfferResult::FeesCollected(self.collect_fees(seat)?),
        };
        Ok(OfferOutcome { seat, result })
    }

    /// Build the "matchOffer" invitation for `first_seat` and deliver it to
    /// `address`. Each first seat gets exactly one.
    pub fn make_second_invitation(&mut self, first_seat: SeatId, address: &str) -> Result<()> {
        if !self.awaiting_match.contains(&first_seat) {
            return Err(EscrowError::ShapeMismatch {
                reason: format!("{first_seat} is not awaiting a match invitation"),
            });
        }
        let first = self.host.seat(first_seat)?;
        first.ensure_active()?;
        let custom = first.proposal.clone();
        if !self.directory.knows(address) {
            return Err(EscrowError::UnknownAddress(address.to_string()));
        }
        let invitation = self.host.make_invitation(
            constants::MATCH_OFFER_DESC,
            SwapHandler::MatchOffer { first_seat },
            None,
            Some(custom),
        )?;
        self.directory.deposit(address, invitation)?;
        self.awaiting_match.remove(&first_seat);
        tracing::info!(instance = %self.instance(), %first_seat, %address, "match invitation sent");
        Ok(())
    }

    /// Current value of a governed amount parameter.
    pub fn get_amount(&self, name: &str) -> Result<Amount> {
        self.governor.params().get_amount(name)
    }

    #[must_use]
    pub fn get_governed_params(&self) -> BTreeMap<String, ParamValue> {
        self.governor.governed_params()
    }

    /// A committee member proposes new parameter values.
    pub fn propose_change(
        &mut self,
        committee: &mut Committee,
        cap: &VoterCap,
        changes: ParamChanges,
        now: DateTime<Utc>,
    ) -> Result<QuestionHandle> {
        self.governor.propose(committee, cap, changes, now)
    }

    /// Count the open question after its deadline and apply the outcome.
    pub fn resolve_question(
        &mut self,
        committee: &mut Committee,
        now: DateTime<Utc>,
    ) -> Result<ParamChangeOutcome> {
        self.governor.resolve(committee, now)
    }

    #[must_use]
    pub fn open_question(&self) -> Option<QuestionHandle> {
        self.governor.open_question()
    }

    pub fn describe(&self, invitation: &Invitation) -> Result<InvitationDetails> {
        self.host.describe(invitation)
    }

    pub fn seat(&self, seat: SeatId) -> Result<&Seat> {
        self.host.seat(seat)
    }

    #[must_use]
    pub fn payout(&self, seat: SeatId) -> Option<&Payout> {
        self.host.payout(seat)
    }

    /// Owner-requested exit; only `onDemand` seats may leave.
    pub fn request_exit(&mut self, seat: SeatId) -> Result<Payout> {
        let payout = self.host.request_exit(seat)?;
        self.awaiting_match.remove(&seat);
        Ok(payout)
    }

    /// Exit every seat whose `afterDeadline` exit rule has fired.
    pub fn expire_seats(&mut self, now: DateTime<Utc>) -> Result<Vec<Payout>> {
        let payouts = self.host.expire_seats(now)?;
        for payout in &payouts {
            self.awaiting_match.remove(&payout.seat);
        }
        Ok(payouts)
    }

    pub fn fee_balance(&self) -> Result<Amount> {
        Ok(self
            .host
            .allocation(self.fee_seat)?
            .get(&self.fee_keyword)
            .cloned()
            .unwrap_or_else(|| Amount::empty(&self.fee_brand)))
    }

    #[must_use]
    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn directory_mut(&mut self) -> &mut D {
        &mut self.directory
    }

    #[must_use]
    pub fn issuers(&self) -> &IssuerRegistry {
        &self.issuers
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.host.is_halted()
    }

    /// Full conservation audit of the instance's seats.
    pub fn audit(&mut self) -> Result<()> {
        self.host.verify_conservation()
    }

    // =====================================================================
    // Creator facet
    // =====================================================================

    /// Put a parameter change to the committee on the creator's behalf.
    pub fn change_params(
        &mut self,
        committee: &mut Committee,
        changes: ParamChanges,
        now: DateTime<Utc>,
    ) -> Result<QuestionHandle> {
        self.governor.change_params(committee, changes, now)
    }

    /// Invitation whose redemption pays every collected fee to the redeemer.
    pub fn make_collect_fees_invitation(&mut self) -> Result<Invitation> {
        self.host.make_invitation(
            constants::COLLECT_FEES_DESC,
            SwapHandler::CollectFees,
            Some(ProposalShape::any()),
            None,
        )
    }

    // =====================================================================
    // Handlers
    // =====================================================================

    fn current_fee(&self) -> Result<Amount> {
        self.governor.params().get_amount(constants::FEE_PARAM)
    }

    fn match_offer(&mut self, first_seat: SeatId, second_seat: SeatId) -> Result<OfferResult> {
        let first_active = self.host.seat(first_seat)?.is_active();
        if !first_active {
            let err = EscrowError::SeatNotActive {
                seat: first_seat,
                state: self.host.seat(first_seat)?.state().to_string(),
            };
            self.host.fail_seat(second_seat, err.to_string())?;
            return Err(err);
        }

        let want = self.host.seat(first_seat)?.proposal.want.clone();
        let give = self.host.seat(second_seat)?.proposal.give.clone();
        if let Err(err) = second_give_shape(&want).check(Subject::Record(&give), "give") {
            let reason = format!("proposals didn't match: {err}");
            tracing::warn!(instance = %self.instance(), %first_seat, %second_seat, %reason, "swap rejected");
            self.host.fail_seat(second_seat, reason.clone())?;
            self.host.fail_seat(first_seat, reason)?;
            return Err(err);
        }

        let fee = self.current_fee()?;
        let receipt = swap_with_fee(
            &mut self.host,
            first_seat,
            second_seat,
            self.fee_seat,
            &self.fee_keyword,
            fee,
        )?;
        let first = self.payout_of(first_seat)?;
        let second = self.payout_of(second_seat)?;
        Ok(OfferResult::Settled {
            receipt,
            first,
            second,
        })
    }

    fn collect_fees(&mut self, collector: SeatId) -> Result<Payout> {
        let fees = self.host.allocation(self.fee_seat)?.clone();
        if !fees.is_empty() {
            if let Err(err) = self
                .host
                .rearrange(&[TransferPart::new(self.fee_seat, collector, fees)])
            {
                if !err.is_fatal() {
                    self.host.fail_seat(collector, err.to_string())?;
                }
                return Err(err);
            }
        }
        let payout = self.host.exit_seat(collector)?;
        tracing::info!(instance = %self.instance(), seat = %collector, "fees collected");
        Ok(payout)
    }

    fn payout_of(&self, seat: SeatId) -> Result<Payout> {
        self.host
            .payout(seat)
            .cloned()
            .ok_or_else(|| EscrowError::Internal(format!("{seat} exited without a payout")))
    }
}

/// Shape the second party's `give` must satisfy: exactly the first party's
/// `want` keys, each at least the wanted amount.
#[must_use]
pub fn second_give_shape(want: &AmountMap) -> Shape {
    Shape::exact_record(
        want.iter()
            .map(|(keyword, amount)| (keyword.clone(), Shape::AtLeast(amount.clone()))),
    )
}

/// Settle a matched swap: the first party's give (less the fee keyword) goes
/// to the second party, the second party's give goes to the first, and `fee`
/// moves from the first seat to the fee seat. Both seats exit on success and
/// fail with the same reason otherwise.
pub fn swap_with_fee<H: Clone>(
    host: &mut ContractHost<H>,
    first: SeatId,
    second: SeatId,
    fee_seat: SeatId,
    fee_keyword: &str,
    fee: Amount,
) -> Result<RearrangementReceipt> {
    let mut first_give = host.seat(first)?.proposal.give.clone();
    first_give.remove(fee_keyword);
    let second_give = host.seat(second)?.proposal.give.clone();
    let mut fee_leg = AmountMap::new();
    if !matches!(fee.value(), AmountValue::Nat(0)) {
        fee_leg.insert(fee_keyword.to_string(), fee);
    }

    let legs = [
        TransferPart::new(first, second, first_give),
        TransferPart::new(second, first, second_give),
        TransferPart::new(first, fee_seat, fee_leg),
    ];
    let receipt = match host.rearrange(&legs) {
        Ok(receipt) => receipt,
        Err(err) if err.is_fatal() => return Err(err),
        Err(err) => {
            let reason = err.to_string();
            host.fail_seat(first, reason.clone())?;
            host.fail_seat(second, reason)?;
            return Err(err);
        }
    };
    host.exit_seat(first)?;
    host.exit_seat(second)?;
    tracing::info!(%first, %second, digest = %receipt.digest_hex(), "swap settled");
    Ok(receipt)
}
