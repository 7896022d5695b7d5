//! Property tests for the rearrangement engine.
//!
//! Random batches are thrown at randomly funded ledgers from a fixed seed.
//! Whatever the outcome, two things must hold:
//! - a rejected batch leaves every allocation exactly as it was;
//! - per-brand totals never change and the ledger audit always passes.

use openescrow_engine::{SeatLedger, TransferPart, atomic_rearrange};
use openescrow_types::*;
use rand::{Rng, SeedableRng, rngs::StdRng};

const SEATS: usize = 5;
const ROUNDS: usize = 200;

fn brands() -> Vec<Brand> {
    vec![
        Brand::dummy_nat("X"),
        Brand::dummy_nat("Y"),
        Brand::dummy_bag("Ticket"),
    ]
}

fn funded_ledger(rng: &mut StdRng, brands: &[Brand]) -> SeatLedger {
    let mut ledger = SeatLedger::new();
    for _ in 0..SEATS {
        let allocation = random_allocation(rng, brands, 50).unwrap();
        ledger.open_funded_seat(allocation).unwrap();
    }
    ledger
}

fn random_amount(rng: &mut StdRng, brand: &Brand) -> Amount {
    match brand.kind() {
        AssetKind::Nat => Amount::nat(brand, rng.gen_range(0..=60)).unwrap(),
        AssetKind::Bag => Amount::bag(brand, [("a", rng.gen_range(0..3)), ("b", rng.gen_range(0..3))]).unwrap(),
    }
}

fn random_batch(rng: &mut StdRng, brands: &[Brand]) -> Vec<TransferPart> {
    let legs = rng.gen_range(1..=4);
    (0..legs)
        .map(|_| {
            let i = rng.gen_range(0..brands.len());
            // Occasionally file an amount under another brand's keyword.
            let brand = if rng.gen_bool(0.1) {
                &brands[(i + 1) % brands.len()]
            } else {
                &brands[i]
            };
            let amount = random_amount(rng, brand);
            TransferPart::new(
                SeatId(rng.gen_range(0..SEATS)),
                SeatId(rng.gen_range(0..SEATS)),
                [(format!("K{i}"), amount)].into_iter().collect(),
            )
        })
        .collect()
}

fn snapshot(ledger: &SeatLedger) -> Vec<AmountMap> {
    ledger.seats().map(|s| s.allocation().clone()).collect()
}

fn totals(ledger: &SeatLedger) -> Vec<(BrandId, AmountValue)> {
    totals_by_brand(ledger.seats().map(|s| s.allocation()))
        .unwrap()
        .into_iter()
        .filter(|(_, a)| !a.is_empty())
        .map(|(id, a)| (id, a.value().clone()))
        .collect()
}

#[test]
fn batches_are_all_or_nothing() {
    let mut rng = StdRng::seed_from_u64(0x0e5c_0001);
    let brands = brands();
    let mut ledger = funded_ledger(&mut rng, &brands);
    let mut committed = 0usize;
    let mut rejected = 0usize;

    for _ in 0..ROUNDS {
        let before = snapshot(&ledger);
        let batch = random_batch(&mut rng, &brands);
        match atomic_rearrange(&mut ledger, &batch) {
            Ok(receipt) => {
                committed += 1;
                assert_eq!(receipt.legs, batch.len());
            }
            Err(err) => {
                rejected += 1;
                assert!(!err.is_fatal(), "unexpected fatal error: {err}");
                assert_eq!(snapshot(&ledger), before, "rejected batch mutated ledger: {err}");
            }
        }
    }
    assert!(committed > 0, "no batch ever committed");
    assert!(rejected > 0, "no batch ever rejected");
}

#[test]
fn totals_conserved_across_random_batches() {
    let mut rng = StdRng::seed_from_u64(0x0e5c_0002);
    let brands = brands();
    let mut ledger = funded_ledger(&mut rng, &brands);
    let start = totals(&ledger);

    for _ in 0..ROUNDS {
        let batch = random_batch(&mut rng, &brands);
        let _ = atomic_rearrange(&mut ledger, &batch);
        assert_eq!(totals(&ledger), start);
        ledger.verify_conservation().unwrap();
    }
}

#[test]
fn leg_order_does_not_change_outcome() {
    let mut rng = StdRng::seed_from_u64(0x0e5c_0003);
    let brands = brands();
    let mut seed_rng = StdRng::seed_from_u64(0x0e5c_0004);

    for _ in 0..50 {
        let seed = seed_rng.gen_range(0..u64::MAX);
        let mut forward = funded_ledger(&mut StdRng::seed_from_u64(seed), &brands);
        let mut reverse = funded_ledger(&mut StdRng::seed_from_u64(seed), &brands);

        let batch = random_batch(&mut rng, &brands);
        let mut reversed = batch.clone();
        reversed.reverse();

        let a = atomic_rearrange(&mut forward, &batch);
        let b = atomic_rearrange(&mut reverse, &reversed);
        assert_eq!(a.is_ok(), b.is_ok());
        assert_eq!(snapshot(&forward), snapshot(&reverse));
    }
}

#[test]
fn payouts_keep_ledger_balanced() {
    let mut rng = StdRng::seed_from_u64(0x0e5c_0005);
    let brands = brands();
    let mut ledger = funded_ledger(&mut rng, &brands);
    for _ in 0..20 {
        let batch = random_batch(&mut rng, &brands);
        let _ = atomic_rearrange(&mut ledger, &batch);
    }
    for i in 0..SEATS {
        if i % 2 == 0 {
            ledger.exit(SeatId(i)).unwrap();
        } else {
            ledger.fail(SeatId(i), "closing").unwrap();
        }
        ledger.verify_conservation().unwrap();
    }
    assert_eq!(ledger.active_seats().count(), 0);
}
