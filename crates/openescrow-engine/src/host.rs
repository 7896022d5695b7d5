//! Contract host: the per-instance context that contracts run inside.
//!
//! A [`ContractHost`] owns an instance's seat ledger and invitation
//! registry and is the only path by which an offer becomes a seat. The
//! offer entry point validates everything before it mutates anything:
//!
//! 1. the invitation exists, belongs to this instance and is unredeemed;
//! 2. no keyword appears in both `give` and `want`;
//! 3. the proposal satisfies the invitation's shape;
//! 4. the payments equal the proposal's `give`.
//!
//! Only then is the seat opened and the invitation burned. After a fatal
//! conservation violation the host is halted and refuses further work.

use chrono::{DateTime, Utc};
use openescrow_types::{
    AmountMap, EscrowError, ExitRule, InstanceId, Proposal, ProposalShape, Result, SeatId,
};

use crate::{
    invitation::{Invitation, InvitationDetails, InvitationRegistry},
    ledger::{SeatLedger, check_payments},
    rearrange::{RearrangementReceipt, TransferPart, atomic_rearrange},
    seat::{Payout, Seat},
};

/// A newly opened seat and the handler its invitation was bound to.
#[derive(Debug, Clone)]
pub struct Offer<H> {
    pub seat: SeatId,
    pub handler: H,
}

#[derive(Debug)]
pub struct ContractHost<H> {
    instance: InstanceId,
    ledger: SeatLedger,
    invitations: InvitationRegistry<H>,
    halted: Option<String>,
}

impl<H: Clone> ContractHost<H> {
    #[must_use]
    pub fn new() -> Self {
        let instance = InstanceId::new();
        tracing::info!(%instance, "contract instance started");
        Self {
            instance,
            ledger: SeatLedger::new(),
            invitations: InvitationRegistry::new(instance),
            halted: None,
        }
    }

    #[must_use]
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Fail with [`EscrowError::ContractHalted`] once the instance is halted.
    pub fn ensure_running(&self) -> Result<()> {
        match &self.halted {
            Some(reason) => Err(EscrowError::ContractHalted {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    pub fn make_invitation(
        &mut self,
        description: impl Into<String>,
        handler: H,
        shape: Option<ProposalShape>,
        custom: Option<Proposal>,
    ) -> Result<Invitation> {
        self.ensure_running()?;
        let invitation = self.invitations.issue(description, handler, shape, custom);
        tracing::debug!(instance = %self.instance, invitation = %invitation.id(), "invitation issued");
        Ok(invitation)
    }

    pub fn describe(&self, invitation: &Invitation) -> Result<InvitationDetails> {
        self.invitations.describe(invitation)
    }

    /// Handler `invitation` would dispatch to, if it can still be redeemed.
    pub fn pending_handler(&self, invitation: &Invitation) -> Result<&H> {
        self.invitations.pending_handler(invitation)
    }

    /// Redeem `invitation` with `proposal`, escrowing `payments`.
    ///
    /// # Errors
    /// `AlreadyRedeemed`, `ForeignInvitation`, `ShapeMismatch`,
    /// `PaymentMismatch` or `AmountOverflow`; in every case the invitation stays unredeemed (unless
    /// it already was) and no seat is opened.
    pub fn offer(
        &mut self,
        invitation: &Invitation,
        proposal: Proposal,
        payments: AmountMap,
    ) -> Result<Offer<H>> {
        self.ensure_running()?;
        let shape = self.invitations.check_redeemable(invitation)?;
        proposal.validate()?;
        if let Some(shape) = shape {
            shape.check(&proposal)?;
        }
        check_payments(&proposal.give, &payments)?;

        let seat = self.ledger.open_seat(proposal, payments)?;
        let handler = self.invitations.burn(invitation)?;
        tracing::info!(
            instance = %self.instance,
            invitation = %invitation.id(),
            %seat,
            "offer accepted"
        );
        Ok(Offer { seat, handler })
    }

    /// Contract-owned seat with no deposit.
    pub fn make_empty_seat(&mut self) -> Result<SeatId> {
        self.ensure_running()?;
        Ok(self.ledger.open_empty_seat())
    }

    /// Contract-owned seat holding freshly minted inventory.
    pub fn make_funded_seat(&mut self, allocation: AmountMap) -> Result<SeatId> {
        self.ensure_running()?;
        self.ledger.open_funded_seat(allocation)
    }

    /// Apply transfers atomically. A conservation violation halts the
    /// instance before the error is returned.
    pub fn rearrange(&mut self, transfers: &[TransferPart]) -> Result<RearrangementReceipt> {
        self.ensure_running()?;
        match atomic_rearrange(&mut self.ledger, transfers) {
            Err(err) if err.is_fatal() => {
                tracing::error!(instance = %self.instance, error = %err, "halting contract instance");
                self.halted = Some(err.to_string());
                Err(err)
            }
            other => other,
        }
    }

    /// Exit initiated by the contract (settlement or cancellation).
    pub fn exit_seat(&mut self, seat: SeatId) -> Result<Payout> {
        self.ensure_running()?;
        let payout = self.ledger.exit(seat)?;
        tracing::info!(instance = %self.instance, %seat, "seat exited");
        Ok(payout)
    }

    /// Exit requested by the seat's owner. Only `onDemand` seats may leave
    /// at will.
    pub fn request_exit(&mut self, seat: SeatId) -> Result<Payout> {
        let rule = self.seat(seat)?.proposal.exit;
        match rule {
            ExitRule::OnDemand => self.exit_seat(seat),
            _ => Err(EscrowError::ExitNotAllowed {
                seat,
                reason: format!("exit rule is {rule}"),
            }),
        }
    }

    pub fn fail_seat(&mut self, seat: SeatId, reason: impl Into<String>) -> Result<Payout> {
        self.ensure_running()?;
        let reason = reason.into();
        let payout = self.ledger.fail(seat, reason.clone())?;
        tracing::warn!(instance = %self.instance, %seat, %reason, "seat failed");
        Ok(payout)
    }

    /// Exit every active seat whose `afterDeadline` has passed at `now`.
    pub fn expire_seats(&mut self, now: DateTime<Utc>) -> Result<Vec<Payout>> {
        self.ensure_running()?;
        let due: Vec<SeatId> = self
            .ledger
            .active_seats()
            .filter(|s| matches!(s.proposal.exit, ExitRule::AfterDeadline(deadline) if deadline <= now))
            .map(|s| s.id)
            .collect();
        let mut payouts = Vec::with_capacity(due.len());
        for seat in due {
            payouts.push(self.ledger.exit(seat)?);
            tracing::info!(instance = %self.instance, %seat, "seat expired");
        }
        Ok(payouts)
    }

    pub fn seat(&self, seat: SeatId) -> Result<&Seat> {
        self.ledger.get(seat)
    }

    pub fn allocation(&self, seat: SeatId) -> Result<&AmountMap> {
        self.ledger.allocation(seat)
    }

    #[must_use]
    pub fn payout(&self, seat: SeatId) -> Option<&Payout> {
        self.ledger.payout(seat)
    }

    #[must_use]
    pub fn ledger(&self) -> &SeatLedger {
        &self.ledger
    }

    /// Full-ledger conservation audit. Halts the instance on failure.
    pub fn verify_conservation(&mut self) -> Result<()> {
        if let Err(err) = self.ledger.verify_conservation() {
            tracing::error!(instance = %self.instance, error = %err, "conservation audit failed");
            self.halted = Some(err.to_string());
            return Err(err);
        }
        Ok(())
    }
}

impl<H: Clone> Default for ContractHost<H> {
    fn default() -> Self {
        Self::new()
    }
}
