//! Seat ledger: the arena of escrow positions for one contract instance.
//!
//! Seats are addressed by [`SeatId`] (their arena index). The ledger owns the
//! supply bookkeeping: every deposit made when a seat opens and every payout
//! made when a seat closes is recorded in a [`SupplyConservation`] tracker,
//! so [`SeatLedger::verify_conservation`] can prove that escrow neither
//! mints nor burns assets.

use std::collections::BTreeMap;

use openescrow_types::{Amount, AmountMap, EscrowError, Proposal, Result, SeatId, totals_by_brand};

use crate::{
    conservation::SupplyConservation,
    seat::{Payout, Seat, SeatState},
};

#[derive(Debug, Default)]
pub struct SeatLedger {
    seats: Vec<Seat>,
    supply: SupplyConservation,
    payouts: BTreeMap<SeatId, Payout>,
}

impl SeatLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a seat escrowing `payments`, which must equal `proposal.give`.
    ///
    /// # Errors
    /// Returns [`EscrowError::PaymentMismatch`] if the payments differ from
    /// the proposal's `give` in any keyword, brand or value.
    pub fn open_seat(&mut self, proposal: Proposal, payments: AmountMap) -> Result<SeatId> {
        check_payments(&proposal.give, &payments)?;
        self.supply = self.staged_supply(&payments, SupplyConservation::record_deposit)?;
        let id = SeatId(self.seats.len());
        self.seats.push(Seat::new(id, proposal, payments));
        Ok(id)
    }

    /// Open a seat with no deposit, used for contract-owned accounts such as
    /// a fee sink or an inventory.
    pub fn open_empty_seat(&mut self) -> SeatId {
        let id = SeatId(self.seats.len());
        self.seats.push(Seat::new(id, Proposal::default(), AmountMap::new()));
        id
    }

    /// Open a seat pre-loaded with `allocation` (contract-minted inventory).
    pub fn open_funded_seat(&mut self, allocation: AmountMap) -> Result<SeatId> {
        self.supply = self.staged_supply(&allocation, SupplyConservation::record_deposit)?;
        let id = SeatId(self.seats.len());
        self.seats.push(Seat::new(id, Proposal::default(), allocation));
        Ok(id)
    }

    pub fn get(&self, id: SeatId) -> Result<&Seat> {
        self.seats.get(id.0).ok_or(EscrowError::SeatNotFound(id))
    }

    pub(crate) fn get_mut(&mut self, id: SeatId) -> Result<&mut Seat> {
        self.seats.get_mut(id.0).ok_or(EscrowError::SeatNotFound(id))
    }

    pub fn allocation(&self, id: SeatId) -> Result<&AmountMap> {
        Ok(self.get(id)?.allocation())
    }

    /// Exit a seat normally, paying out its current allocation.
    pub fn exit(&mut self, id: SeatId) -> Result<Payout> {
        self.close(id, SeatState::Exited, None)
    }

    /// Fail a seat with a diagnostic, paying out its current allocation.
    pub fn fail(&mut self, id: SeatId, reason: impl Into<String>) -> Result<Payout> {
        self.close(id, SeatState::Failed, Some(reason.into()))
    }

    fn close(&mut self, id: SeatId, target: SeatState, failure: Option<String>) -> Result<Payout> {
        let seat = self.get(id)?;
        seat.ensure_active()?;
        let supply = self.staged_supply(seat.allocation(), SupplyConservation::record_withdrawal)?;
        let amounts = self.get_mut(id)?.close(target, failure.clone())?;
        self.supply = supply;
        let payout = Payout {
            seat: id,
            amounts,
            failure,
        };
        self.payouts.insert(id, payout.clone());
        Ok(payout)
    }

    /// Supply tracker with every amount in `amounts` recorded, leaving the
    /// ledger's own tracker untouched until the caller commits it.
    fn staged_supply(
        &self,
        amounts: &AmountMap,
        record: fn(&mut SupplyConservation, &Amount) -> Result<()>,
    ) -> Result<SupplyConservation> {
        let mut supply = self.supply.clone();
        for amount in amounts.values() {
            record(&mut supply, amount)?;
        }
        Ok(supply)
    }

    /// The payout delivered when the seat closed, if it has.
    #[must_use]
    pub fn payout(&self, id: SeatId) -> Option<&Payout> {
        self.payouts.get(&id)
    }

    pub fn seats(&self) -> impl Iterator<Item = &Seat> {
        self.seats.iter()
    }

    pub fn active_seats(&self) -> impl Iterator<Item = &Seat> {
        self.seats.iter().filter(|s| s.is_active())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seats.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    /// Replace allocations in one step. Callers have already validated every
    /// new allocation.
    pub(crate) fn commit(&mut self, staged: BTreeMap<SeatId, AmountMap>) -> Result<()> {
        for (id, allocation) in staged {
            self.get_mut(id)?.allocation = allocation;
        }
        Ok(())
    }

    /// Check `Σ allocations == deposits - payouts` for every brand ever
    /// escrowed.
    ///
    /// # Errors
    /// Returns [`EscrowError::ConservationViolation`] on any mismatch.
    pub fn verify_conservation(&self) -> Result<()> {
        let held = totals_by_brand(self.seats.iter().map(Seat::allocation))?;
        let tracked = self.supply.tracked_brands();
        for brand in &tracked {
            match held.get(&brand.id()) {
                Some(actual) => self.supply.verify(actual)?,
                None => self.supply.verify(&Amount::empty(brand))?,
            }
        }
        for (id, amount) in &held {
            if !amount.is_empty() && !tracked.iter().any(|b| b.id() == *id) {
                return Err(EscrowError::ConservationViolation {
                    reason: format!("{amount} held in escrow but never deposited"),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn supply(&self) -> &SupplyConservation {
        &self.supply
    }
}

/// `payments` must carry exactly the keywords of `give`, each equal in brand
/// and value.
pub fn check_payments(give: &AmountMap, payments: &AmountMap) -> Result<()> {
    for (keyword, wanted) in give {
        let Some(paid) = payments.get(keyword) else {
            return Err(EscrowError::PaymentMismatch {
                reason: format!("no payment for {keyword}"),
            });
        };
        let equal = paid.is_equal(wanted).map_err(|_| EscrowError::PaymentMismatch {
            reason: format!("{keyword}: paid {paid}, expected {wanted}"),
        })?;
        if !equal {
            return Err(EscrowError::PaymentMismatch {
                reason: format!("{keyword}: paid {paid}, expected {wanted}"),
            });
        }
    }
    if let Some(extra) = payments.keys().find(|k| !give.contains_key(*k)) {
        return Err(EscrowError::PaymentMismatch {
            reason: format!("payment for {extra} not in give"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use openescrow_types::{Brand, amounts};

    use super::*;

    fn give(x: &Brand, n: u128) -> AmountMap {
        amounts([("A", Amount::nat(x, n).unwrap())])
    }

    #[test]
    fn open_seat_escrows_payments() {
        let x = Brand::dummy_nat("X");
        let mut ledger = SeatLedger::new();
        let id = ledger
            .open_seat(Proposal::new(give(&x, 5), AmountMap::new()), give(&x, 5))
            .unwrap();
        assert_eq!(id, SeatId(0));
        assert_eq!(ledger.allocation(id).unwrap()["A"].as_nat(), Some(5));
        assert_eq!(ledger.supply().total_deposits(&x).as_nat(), Some(5));
        ledger.verify_conservation().unwrap();
    }

    #[test]
    fn overflowing_deposit_records_nothing() {
        let x = Brand::dummy_nat("X");
        let y = Brand::dummy_nat("Y");
        let mut ledger = SeatLedger::new();
        ledger
            .open_funded_seat(amounts([("Stock", Amount::nat(&x, u128::MAX).unwrap())]))
            .unwrap();
        let payments = amounts([
            ("A", Amount::nat(&y, 1).unwrap()),
            ("B", Amount::nat(&x, 1).unwrap()),
        ]);
        let err = ledger
            .open_seat(Proposal::new(payments.clone(), AmountMap::new()), payments)
            .unwrap_err();
        assert!(matches!(err, EscrowError::AmountOverflow), "{err}");
        assert_eq!(ledger.len(), 1);
        assert!(ledger.supply().total_deposits(&y).is_empty());
        ledger.verify_conservation().unwrap();
    }

    #[test]
    fn closed_seat_rejects_second_close_without_withdrawal() {
        let x = Brand::dummy_nat("X");
        let mut ledger = SeatLedger::new();
        let id = ledger
            .open_seat(Proposal::new(give(&x, 5), AmountMap::new()), give(&x, 5))
            .unwrap();
        ledger.exit(id).unwrap();
        let err = ledger.fail(id, "late").unwrap_err();
        assert!(matches!(err, EscrowError::SeatNotActive { .. }));
        assert_eq!(ledger.supply().total_withdrawals(&x).as_nat(), Some(5));
        assert_eq!(ledger.get(id).unwrap().state(), SeatState::Exited);
        ledger.verify_conservation().unwrap();
    }

    #[test]
    fn payments_must_equal_give() {
        let x = Brand::dummy_nat("X");
        let y = Brand::dummy_nat("Y");
        let mut ledger = SeatLedger::new();
        let proposal = Proposal::new(give(&x, 5), AmountMap::new());
        for bad in [give(&x, 4), give(&y, 5), AmountMap::new()] {
            let err = ledger.open_seat(proposal.clone(), bad).unwrap_err();
            assert!(matches!(err, EscrowError::PaymentMismatch { .. }), "{err}");
        }
        let mut extra = give(&x, 5);
        extra.insert("B".into(), Amount::nat(&x, 1).unwrap());
        assert!(ledger.open_seat(proposal, extra).is_err());
        assert!(ledger.is_empty());
        assert!(ledger.supply().tracked_brands().is_empty());
    }

    #[test]
    fn exit_pays_out_and_records_withdrawal() {
        let x = Brand::dummy_nat("X");
        let mut ledger = SeatLedger::new();
        let id = ledger
            .open_seat(Proposal::new(give(&x, 5), AmountMap::new()), give(&x, 5))
            .unwrap();
        let payout = ledger.exit(id).unwrap();
        assert_eq!(payout.amounts["A"].as_nat(), Some(5));
        assert!(payout.failure.is_none());
        assert_eq!(ledger.payout(id), Some(&payout));
        assert!(ledger.allocation(id).unwrap().is_empty());
        ledger.verify_conservation().unwrap();

        let err = ledger.exit(id).unwrap_err();
        assert!(matches!(err, EscrowError::SeatNotActive { .. }));
    }

    #[test]
    fn fail_records_reason() {
        let mut ledger = SeatLedger::new();
        let id = ledger.open_empty_seat();
        let payout = ledger.fail(id, "terms did not match").unwrap();
        assert_eq!(payout.failure.as_deref(), Some("terms did not match"));
        assert_eq!(ledger.get(id).unwrap().state(), SeatState::Failed);
        assert_eq!(ledger.active_seats().count(), 0);
    }

    #[test]
    fn unknown_seat() {
        let ledger = SeatLedger::new();
        assert!(matches!(
            ledger.get(SeatId(3)),
            Err(EscrowError::SeatNotFound(SeatId(3)))
        ));
    }

    #[test]
    fn conservation_detects_tampering() {
        let x = Brand::dummy_nat("X");
        let mut ledger = SeatLedger::new();
        let id = ledger
            .open_seat(Proposal::new(give(&x, 5), AmountMap::new()), give(&x, 5))
            .unwrap();
        ledger.get_mut(id).unwrap().allocation = give(&x, 6);
        let err = ledger.verify_conservation().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn conservation_detects_undeposited_brand() {
        let y = Brand::dummy_nat("Y");
        let mut ledger = SeatLedger::new();
        let id = ledger.open_empty_seat();
        ledger.get_mut(id).unwrap().allocation = give(&y, 1);
        assert!(ledger.verify_conservation().is_err());
    }

    #[test]
    fn funded_seat_counts_as_deposit() {
        let t = Brand::dummy_bag("Ticket");
        let mut ledger = SeatLedger::new();
        let stock = amounts([("Tickets", Amount::bag(&t, [("front", 2)]).unwrap())]);
        ledger.open_funded_seat(stock).unwrap();
        ledger.verify_conservation().unwrap();
    }
}
