//! Atomic rearrangement: the only way assets move between seats.
//!
//! A batch of [`TransferPart`]s is applied as a single unit. Every leg is
//! staged against scratch copies of the touched allocations; nothing is
//! written back to the ledger until every check has passed. Within a batch,
//! legs are netted per seat and keyword (`new = old + gains - losses`), so
//! the outcome does not depend on the order the legs are listed in.
//!
//! Checks run in this order and the first failure aborts the batch:
//! 1. every touched seat exists and is active;
//! 2. no leg moves a brand its source never held, or mixes two brands
//!    under one keyword (`BrandMismatch`);
//! 3. no seat would go negative (`InsufficientFunds`);
//! 4. per-brand totals over the touched seats are unchanged
//!    (`ConservationViolation`, fatal).

use std::collections::{BTreeMap, BTreeSet};

use openescrow_types::{
    Amount, AmountMap, BrandId, EscrowError, Keyword, Result, SeatId, totals_by_brand,
};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::ledger::SeatLedger;

/// One leg of a rearrangement: move `amounts` from one seat to another,
/// keyword by keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferPart {
    pub from: SeatId,
    pub to: SeatId,
    pub amounts: AmountMap,
}

impl TransferPart {
    #[must_use]
    pub fn new(from: SeatId, to: SeatId, amounts: AmountMap) -> Self {
        Self { from, to, amounts }
    }
}

/// Proof of a committed rearrangement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RearrangementReceipt {
    pub legs: usize,
    /// Every seat whose allocation was rewritten, ascending.
    pub seats: Vec<SeatId>,
    /// Hash over the legs in submission order.
    pub digest: [u8; 32],
}

impl RearrangementReceipt {
    #[must_use]
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

/// Apply `transfers` to `ledger` atomically.
///
/// # Errors
/// On any error the ledger is unchanged. [`EscrowError::ConservationViolation`]
/// is fatal: callers must stop using the instance.
pub fn atomic_rearrange(
    ledger: &mut SeatLedger,
    transfers: &[TransferPart],
) -> Result<RearrangementReceipt> {
    let touched: BTreeSet<SeatId> = transfers.iter().flat_map(|t| [t.from, t.to]).collect();
    for id in &touched {
        ledger.get(*id)?.ensure_active()?;
    }

    let mut gains: BTreeMap<SeatId, AmountMap> = BTreeMap::new();
    let mut losses: BTreeMap<SeatId, AmountMap> = BTreeMap::new();
    for part in transfers {
        tracing::debug!(from = %part.from, to = %part.to, keywords = part.amounts.len(), "staging leg");
        for (keyword, amount) in &part.amounts {
            merge(losses.entry(part.from).or_default(), keyword, amount)?;
            merge(gains.entry(part.to).or_default(), keyword, amount)?;
        }
    }

    let mut staged: BTreeMap<SeatId, AmountMap> = BTreeMap::new();
    for id in &touched {
        let mut allocation = ledger.allocation(*id)?.clone();
        if let Some(incoming) = gains.get(id) {
            for (keyword, amount) in incoming {
                merge(&mut allocation, keyword, amount)?;
            }
        }
        staged.insert(*id, allocation);
    }

    for (id, outgoing) in &losses {
        let allocation = staged.get(id).ok_or(EscrowError::SeatNotFound(*id))?;
        for (keyword, amount) in outgoing {
            check_brand_held(allocation, keyword, amount)?;
        }
    }

    for (id, outgoing) in &losses {
        let allocation = staged.get_mut(id).ok_or(EscrowError::SeatNotFound(*id))?;
        for (keyword, amount) in outgoing {
            let available = allocation
                .get(keyword)
                .cloned()
                .unwrap_or_else(|| Amount::empty(amount.brand()));
            let left = available
                .subtract(amount)
                .map_err(|_| EscrowError::InsufficientFunds {
                    seat: *id,
                    keyword: keyword.clone(),
                    needed: amount.to_string(),
                    available: available.to_string(),
                })?;
            if left.is_empty() {
                allocation.remove(keyword);
            } else {
                allocation.insert(keyword.clone(), left);
            }
        }
    }

    let before = totals_by_brand(
        touched
            .iter()
            .map(|id| ledger.allocation(*id))
            .collect::<Result<Vec<_>>>()?,
    )?;
    let after = totals_by_brand(staged.values())?;
    check_conserved(&before, &after)?;

    let receipt = RearrangementReceipt {
        legs: transfers.len(),
        seats: touched.into_iter().collect(),
        digest: compute_rearrangement_digest(transfers),
    };
    ledger.commit(staged)?;

    tracing::info!(
        legs = receipt.legs,
        seats = receipt.seats.len(),
        digest = %receipt.digest_hex(),
        "rearrangement committed"
    );
    Ok(receipt)
}

/// Deterministic hash over a batch of legs.
#[must_use]
pub fn compute_rearrangement_digest(transfers: &[TransferPart]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"openescrow:rearrange:v1:");
    hasher.update(index_bytes(transfers.len()));
    for part in transfers {
        hasher.update(index_bytes(part.from.0));
        hasher.update(index_bytes(part.to.0));
        for (keyword, amount) in &part.amounts {
            hasher.update(keyword.as_bytes());
            hasher.update(amount.brand().id().to_string().as_bytes());
            hasher.update(amount.to_string().as_bytes());
        }
    }
    hasher.finalize().into()
}

/// Seat indices and leg counts hash as little-endian `u64`.
fn index_bytes(n: usize) -> [u8; 8] {
    u64::try_from(n).unwrap_or(u64::MAX).to_le_bytes()
}

fn merge(record: &mut AmountMap, keyword: &Keyword, amount: &Amount) -> Result<()> {
    let next = match record.get(keyword) {
        Some(existing) => existing.add(amount)?,
        None => amount.clone(),
    };
    record.insert(keyword.clone(), next);
    Ok(())
}

fn check_brand_held(allocation: &AmountMap, keyword: &str, amount: &Amount) -> Result<()> {
    match allocation.get(keyword) {
        Some(held) if held.brand() != amount.brand() => Err(EscrowError::BrandMismatch {
            expected: held.brand().to_string(),
            actual: amount.brand().to_string(),
        }),
        Some(_) => Ok(()),
        None if allocation.values().any(|a| a.brand() == amount.brand()) => Ok(()),
        None => Err(EscrowError::BrandMismatch {
            expected: held_brands(allocation),
            actual: amount.brand().to_string(),
        }),
    }
}

fn held_brands(allocation: &AmountMap) -> String {
    let names: BTreeSet<String> = allocation.values().map(|a| a.brand().to_string()).collect();
    if names.is_empty() {
        "nothing".to_string()
    } else {
        names.into_iter().collect::<Vec<_>>().join("|")
    }
}

fn check_conserved(
    before: &BTreeMap<BrandId, Amount>,
    after: &BTreeMap<BrandId, Amount>,
) -> Result<()> {
    for id in before.keys().chain(after.keys()) {
        let same = match (before.get(id), after.get(id)) {
            (Some(b), Some(a)) => b.value() == a.value(),
            (Some(x), None) | (None, Some(x)) => x.is_empty(),
            (None, None) => true,
        };
        if !same {
            return Err(EscrowError::ConservationViolation {
                reason: format!(
                    "brand {id}: before {}, after {}",
                    before.get(id).map_or_else(|| "nothing".into(), ToString::to_string),
                    after.get(id).map_or_else(|| "nothing".into(), ToString::to_string),
                ),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use openescrow_types::{Brand, Proposal, amounts};

    use super::*;

    struct Fixture {
        x: Brand,
        y: Brand,
        ledger: SeatLedger,
        alice: SeatId,
        bob: SeatId,
    }

    fn setup() -> Fixture {
        let x = Brand::dummy_nat("X");
        let y = Brand::dummy_nat("Y");
        let mut ledger = SeatLedger::new();
        let a_give = amounts([("A", Amount::nat(&x, 10).unwrap())]);
        let b_give = amounts([("B", Amount::nat(&y, 5).unwrap())]);
        let alice = ledger
            .open_seat(Proposal::new(a_give.clone(), AmountMap::new()), a_give)
            .unwrap();
        let bob = ledger
            .open_seat(Proposal::new(b_give.clone(), AmountMap::new()), b_give)
            .unwrap();
        Fixture {
            x,
            y,
            ledger,
            alice,
            bob,
        }
    }

    #[test]
    fn swap_moves_both_legs() {
        let mut f = setup();
        let legs = [
            TransferPart::new(f.alice, f.bob, amounts([("A", Amount::nat(&f.x, 10).unwrap())])),
            TransferPart::new(f.bob, f.alice, amounts([("B", Amount::nat(&f.y, 5).unwrap())])),
        ];
        let receipt = atomic_rearrange(&mut f.ledger, &legs).unwrap();
        assert_eq!(receipt.legs, 2);
        assert_eq!(receipt.seats, vec![f.alice, f.bob]);
        assert_eq!(receipt.digest_hex().len(), 64);

        let alice = f.ledger.allocation(f.alice).unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice["B"].as_nat(), Some(5));
        assert_eq!(f.ledger.allocation(f.bob).unwrap()["A"].as_nat(), Some(10));
        f.ledger.verify_conservation().unwrap();
    }

    #[test]
    fn insufficient_funds_leaves_ledger_untouched() {
        let mut f = setup();
        let legs = [
            TransferPart::new(f.bob, f.alice, amounts([("B", Amount::nat(&f.y, 5).unwrap())])),
            TransferPart::new(f.alice, f.bob, amounts([("A", Amount::nat(&f.x, 11).unwrap())])),
        ];
        let err = atomic_rearrange(&mut f.ledger, &legs).unwrap_err();
        assert!(
            matches!(&err, EscrowError::InsufficientFunds { seat, .. } if *seat == f.alice),
            "{err}"
        );
        assert_eq!(f.ledger.allocation(f.alice).unwrap()["A"].as_nat(), Some(10));
        assert_eq!(f.ledger.allocation(f.bob).unwrap()["B"].as_nat(), Some(5));
    }

    #[test]
    fn brand_never_held_is_mismatch() {
        let mut f = setup();
        let legs = [TransferPart::new(
            f.alice,
            f.bob,
            amounts([("B", Amount::nat(&f.y, 1).unwrap())]),
        )];
        let err = atomic_rearrange(&mut f.ledger, &legs).unwrap_err();
        assert!(matches!(err, EscrowError::BrandMismatch { .. }), "{err}");
    }

    #[test]
    fn brand_check_precedes_funds_check() {
        let mut f = setup();
        let legs = [
            TransferPart::new(f.alice, f.bob, amounts([("A", Amount::nat(&f.x, 99).unwrap())])),
            TransferPart::new(f.bob, f.alice, amounts([("B", Amount::nat(&f.x, 1).unwrap())])),
        ];
        let err = atomic_rearrange(&mut f.ledger, &legs).unwrap_err();
        assert!(matches!(err, EscrowError::BrandMismatch { .. }), "{err}");
    }

    #[test]
    fn order_independent() {
        let mut f = setup();
        // Bob passes on what he receives in the same batch.
        let carol = f.ledger.open_empty_seat();
        let legs = [
            TransferPart::new(f.bob, carol, amounts([("A", Amount::nat(&f.x, 4).unwrap())])),
            TransferPart::new(f.alice, f.bob, amounts([("A", Amount::nat(&f.x, 4).unwrap())])),
        ];
        atomic_rearrange(&mut f.ledger, &legs).unwrap();
        assert_eq!(f.ledger.allocation(carol).unwrap()["A"].as_nat(), Some(4));
        assert!(!f.ledger.allocation(f.bob).unwrap().contains_key("A"));
        assert_eq!(f.ledger.allocation(f.alice).unwrap()["A"].as_nat(), Some(6));
    }

    #[test]
    fn inactive_seat_rejected() {
        let mut f = setup();
        f.ledger.exit(f.bob).unwrap();
        let legs = [TransferPart::new(
            f.alice,
            f.bob,
            amounts([("A", Amount::nat(&f.x, 1).unwrap())]),
        )];
        let err = atomic_rearrange(&mut f.ledger, &legs).unwrap_err();
        assert!(matches!(err, EscrowError::SeatNotActive { .. }));
        assert_eq!(f.ledger.allocation(f.alice).unwrap()["A"].as_nat(), Some(10));
    }

    #[test]
    fn keyword_brand_collision_rejected() {
        let mut f = setup();
        // Bob already holds Y under "B"; X cannot land in the same slot.
        let legs = [TransferPart::new(
            f.alice,
            f.bob,
            amounts([("B", Amount::nat(&f.x, 1).unwrap())]),
        )];
        let err = atomic_rearrange(&mut f.ledger, &legs).unwrap_err();
        assert!(matches!(err, EscrowError::BrandMismatch { .. }));
    }

    #[test]
    fn empty_batch_is_noop() {
        let mut f = setup();
        let receipt = atomic_rearrange(&mut f.ledger, &[]).unwrap();
        assert_eq!(receipt.legs, 0);
        assert!(receipt.seats.is_empty());
    }

    #[test]
    fn digest_is_deterministic() {
        let f = setup();
        let legs = [TransferPart::new(
            f.alice,
            f.bob,
            amounts([("A", Amount::nat(&f.x, 1).unwrap())]),
        )];
        assert_eq!(
            compute_rearrangement_digest(&legs),
            compute_rearrangement_digest(&legs)
        );
        assert_ne!(compute_rearrangement_digest(&legs), compute_rearrangement_digest(&[]));
    }

    #[test]
    fn digest_tracks_leg_direction() {
        let f = setup();
        let one = amounts([("A", Amount::nat(&f.x, 1).unwrap())]);
        let forward = [TransferPart::new(f.alice, f.bob, one.clone())];
        let backward = [TransferPart::new(f.bob, f.alice, one)];
        assert_ne!(
            compute_rearrangement_digest(&forward),
            compute_rearrangement_digest(&backward)
        );
        assert_eq!(index_bytes(7), 7u64.to_le_bytes());
    }

    #[test]
    fn receipt_serializes_for_audit() {
        let mut f = setup();
        let legs = [TransferPart::new(
            f.alice,
            f.bob,
            amounts([("A", Amount::nat(&f.x, 4).unwrap())]),
        )];
        let receipt = atomic_rearrange(&mut f.ledger, &legs).unwrap();
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["legs"], 1);
        assert_eq!(json["seats"].as_array().unwrap().len(), 2);
        assert_eq!(json["digest"].as_array().unwrap().len(), 32);
    }

    #[test]
    fn conservation_check_flags_minting() {
        let x = Brand::dummy_nat("X");
        let before = totals_by_brand([&amounts([("A", Amount::nat(&x, 1).unwrap())])]).unwrap();
        let after = totals_by_brand([&amounts([("A", Amount::nat(&x, 2).unwrap())])]).unwrap();
        let err = check_conserved(&before, &after).unwrap_err();
        assert!(err.is_fatal());
        assert!(check_conserved(&before, &before).is_ok());
    }
}
