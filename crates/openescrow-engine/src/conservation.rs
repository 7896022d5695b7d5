//! Supply conservation invariant checker.
//!
//! Invariant enforced after every rearrangement:
//! ```text
//! ∀ brand: Σ(seat allocations) == Σ(deposits) - Σ(payouts)
//! ```
//!
//! A violation is fatal for the contract instance that observed it.

use std::collections::{BTreeMap, BTreeSet};

use openescrow_types::{Amount, Brand, BrandId, EscrowError, Result};

/// Per-brand running totals of escrowed deposits and paid-out withdrawals.
#[derive(Debug, Clone, Default)]
pub struct SupplyConservation {
    deposits: BTreeMap<BrandId, Amount>,
    withdrawals: BTreeMap<BrandId, Amount>,
}

impl SupplyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record assets entering escrow.
    pub fn record_deposit(&mut self, amount: &Amount) -> Result<()> {
        accumulate(&mut self.deposits, amount)
    }

    /// Record assets leaving escrow through a payout.
    pub fn record_withdrawal(&mut self, amount: &Amount) -> Result<()> {
        accumulate(&mut self.withdrawals, amount)
    }

    /// Expected supply held in escrow for a brand: deposits - withdrawals.
    ///
    /// # Errors
    /// Returns [`EscrowError::ConservationViolation`] if more was paid out
    /// than was ever deposited.
    pub fn expected_supply(&self, brand: &Brand) -> Result<Amount> {
        let deposited = self.total_deposits(brand);
        let withdrawn = self.total_withdrawals(brand);
        deposited
            .subtract(&withdrawn)
            .map_err(|_| EscrowError::ConservationViolation {
                reason: format!("brand {brand}: withdrawals {withdrawn} exceed deposits {deposited}"),
            })
    }

    /// Verify that `actual` (the sum over all seats) equals the expected
    /// supply for its brand.
    ///
    /// # Errors
    /// Returns [`EscrowError::ConservationViolation`] if actual ≠ expected.
    pub fn verify(&self, actual: &Amount) -> Result<()> {
        let brand = actual.brand();
        let expected = self.expected_supply(brand)?;
        if expected.value() != actual.value() {
            return Err(EscrowError::ConservationViolation {
                reason: format!(
                    "brand {brand}: actual supply {actual} != expected {expected} \
                     (deposits={}, withdrawals={})",
                    self.total_deposits(brand),
                    self.total_withdrawals(brand),
                ),
            });
        }
        Ok(())
    }

    /// Every brand that ever entered escrow.
    #[must_use]
    pub fn tracked_brands(&self) -> Vec<&Brand> {
        let mut seen = BTreeSet::new();
        self.deposits
            .values()
            .chain(self.withdrawals.values())
            .map(Amount::brand)
            .filter(|b| seen.insert(b.id()))
            .collect()
    }

    #[must_use]
    pub fn total_deposits(&self, brand: &Brand) -> Amount {
        self.deposits
            .get(&brand.id())
            .cloned()
            .unwrap_or_else(|| Amount::empty(brand))
    }

    #[must_use]
    pub fn total_withdrawals(&self, brand: &Brand) -> Amount {
        self.withdrawals
            .get(&brand.id())
            .cloned()
            .unwrap_or_else(|| Amount::empty(brand))
    }
}

fn accumulate(totals: &mut BTreeMap<BrandId, Amount>, amount: &Amount) -> Result<()> {
    let id = amount.brand().id();
    let next = match totals.get(&id) {
        Some(total) => total.add(amount)?,
        None => amount.clone(),
    };
    totals.insert(id, next);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_supply_is_zero() {
        let x = Brand::dummy_nat("X");
        let sc = SupplyConservation::new();
        assert!(sc.expected_supply(&x).unwrap().is_empty());
        assert!(sc.verify(&Amount::empty(&x)).is_ok());
        assert!(sc.tracked_brands().is_empty());
    }

    #[test]
    fn deposits_and_withdrawals_net_out() {
        let x = Brand::dummy_nat("X");
        let mut sc = SupplyConservation::new();
        sc.record_deposit(&Amount::nat(&x, 1000).unwrap()).unwrap();
        sc.record_deposit(&Amount::nat(&x, 500).unwrap()).unwrap();
        sc.record_withdrawal(&Amount::nat(&x, 300).unwrap()).unwrap();
        assert_eq!(sc.expected_supply(&x).unwrap().as_nat(), Some(1200));
        assert!(sc.verify(&Amount::nat(&x, 1200).unwrap()).is_ok());
    }

    #[test]
    fn verify_fails_on_mismatch() {
        let x = Brand::dummy_nat("X");
        let mut sc = SupplyConservation::new();
        sc.record_deposit(&Amount::nat(&x, 10).unwrap()).unwrap();
        let err = sc.verify(&Amount::nat(&x, 11).unwrap()).unwrap_err();
        assert!(matches!(err, EscrowError::ConservationViolation { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn over_withdrawal_is_a_violation() {
        let x = Brand::dummy_nat("X");
        let mut sc = SupplyConservation::new();
        sc.record_withdrawal(&Amount::nat(&x, 1).unwrap()).unwrap();
        assert!(matches!(
            sc.expected_supply(&x),
            Err(EscrowError::ConservationViolation { .. })
        ));
    }

    #[test]
    fn bag_supply_tracked_per_label() {
        let t = Brand::dummy_bag("Ticket");
        let mut sc = SupplyConservation::new();
        sc.record_deposit(&Amount::bag(&t, [("front", 3), ("back", 2)]).unwrap())
            .unwrap();
        sc.record_withdrawal(&Amount::bag(&t, [("front", 1)]).unwrap())
            .unwrap();
        let left = Amount::bag(&t, [("front", 2), ("back", 2)]).unwrap();
        assert!(sc.verify(&left).is_ok());
        assert_eq!(sc.tracked_brands().len(), 1);
    }

    #[test]
    fn brands_tracked_independently() {
        let x = Brand::dummy_nat("X");
        let y = Brand::dummy_nat("Y");
        let mut sc = SupplyConservation::new();
        sc.record_deposit(&Amount::nat(&x, 5).unwrap()).unwrap();
        sc.record_deposit(&Amount::nat(&y, 7).unwrap()).unwrap();
        assert_eq!(sc.expected_supply(&x).unwrap().as_nat(), Some(5));
        assert_eq!(sc.expected_supply(&y).unwrap().as_nat(), Some(7));
        assert_eq!(sc.tracked_brands().len(), 2);
    }
}
