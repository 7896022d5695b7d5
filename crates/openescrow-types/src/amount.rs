//! Amount algebra: brand-scoped, non-negative quantities.
//!
//! An [`Amount`] is an immutable value object `{ brand, value }`. The value is
//! either a count of base units ([`AmountValue::Nat`]) or a bag of labeled
//! units ([`AmountValue::Bag`]). Every binary operation first checks that both
//! operands carry the same brand. Subtraction never produces a negative value;
//! it fails with [`EscrowError::Underflow`] instead.
//!
//! Bags are kept normalized (no zero-count labels), so structural equality is
//! amount equality.

use std::{collections::BTreeMap, fmt};

use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::Serialize;

use crate::{AssetKind, Brand, BrandId, EscrowError, Result};

/// Keyword naming one slot of a proposal or allocation (e.g. `"Fee"`).
pub type Keyword = String;

/// A keyword record of amounts: proposal `give`/`want`, seat allocations,
/// payouts.
pub type AmountMap = BTreeMap<Keyword, Amount>;

/// The value part of an [`Amount`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AmountValue {
    /// Fungible base units.
    Nat(u128),
    /// Label → count. Never contains zero counts.
    Bag(BTreeMap<String, u64>),
}

impl AmountValue {
    #[must_use]
    pub fn kind(&self) -> AssetKind {
        match self {
            Self::Nat(_) => AssetKind::Nat,
            Self::Bag(_) => AssetKind::Bag,
        }
    }

    fn normalized(self) -> Self {
        match self {
            Self::Bag(mut bag) => {
                bag.retain(|_, count| *count > 0);
                Self::Bag(bag)
            }
            nat @ Self::Nat(_) => nat,
        }
    }

    fn empty(kind: AssetKind) -> Self {
        match kind {
            AssetKind::Nat => Self::Nat(0),
            AssetKind::Bag => Self::Bag(BTreeMap::new()),
        }
    }
}

/// A brand-scoped quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Amount {
    brand: Brand,
    value: AmountValue,
}

impl Amount {
    /// Make an amount, checking the value's kind against the brand's.
    pub fn make(brand: &Brand, value: AmountValue) -> Result<Self> {
        if value.kind() != brand.kind() {
            return Err(EscrowError::KindMismatch {
                brand: brand.name().to_string(),
                expected: brand.kind(),
                actual: value.kind(),
            });
        }
        Ok(Self {
            brand: brand.clone(),
            value: value.normalized(),
        })
    }

    /// Fungible amount of `value` base units.
    pub fn nat(brand: &Brand, value: u128) -> Result<Self> {
        Self::make(brand, AmountValue::Nat(value))
    }

    /// Bag amount from `(label, count)` entries. Repeated labels accumulate.
    pub fn bag<'a>(brand: &Brand, entries: impl IntoIterator<Item = (&'a str, u64)>) -> Result<Self> {
        let mut bag: BTreeMap<String, u64> = BTreeMap::new();
        for (label, count) in entries {
            let slot = bag.entry(label.to_string()).or_insert(0);
            *slot = slot.checked_add(count).ok_or(EscrowError::AmountOverflow)?;
        }
        Self::make(brand, AmountValue::Bag(bag))
    }

    /// The empty amount of a brand.
    #[must_use]
    pub fn empty(brand: &Brand) -> Self {
        Self {
            brand: brand.clone(),
            value: AmountValue::empty(brand.kind()),
        }
    }

    /// Convert a display-unit decimal (e.g. `0.5` IST) into base units using
    /// the brand's decimal places.
    pub fn from_display(brand: &Brand, display: Decimal) -> Result<Self> {
        if display.is_sign_negative() {
            return Err(EscrowError::InvalidAmount {
                reason: format!("negative display value {display}"),
            });
        }
        let mut scaled = display;
        for _ in 0..brand.decimal_places() {
            scaled = scaled
                .checked_mul(Decimal::TEN)
                .ok_or(EscrowError::AmountOverflow)?;
        }
        if !scaled.fract().is_zero() {
            return Err(EscrowError::InvalidAmount {
                reason: format!(
                    "{display} has more precision than {} ({} decimal places)",
                    brand.name(),
                    brand.decimal_places()
                ),
            });
        }
        let units = scaled.to_u128().ok_or(EscrowError::AmountOverflow)?;
        Self::nat(brand, units)
    }

    /// Display-unit decimal for a fungible amount.
    pub fn to_display(&self) -> Result<Decimal> {
        let AmountValue::Nat(units) = self.value else {
            return Err(self.kind_error(AssetKind::Nat));
        };
        let units = i128::try_from(units).map_err(|_| EscrowError::AmountOverflow)?;
        Decimal::try_from_i128_with_scale(units, self.brand.decimal_places()).map_err(|e| {
            EscrowError::InvalidAmount {
                reason: e.to_string(),
            }
        })
    }

    #[must_use]
    pub fn brand(&self) -> &Brand {
        &self.brand
    }

    #[must_use]
    pub fn value(&self) -> &AmountValue {
        &self.value
    }

    /// Base units if fungible.
    #[must_use]
    pub fn as_nat(&self) -> Option<u128> {
        match self.value {
            AmountValue::Nat(v) => Some(v),
            AmountValue::Bag(_) => None,
        }
    }

    /// Label counts if bag-valued.
    #[must_use]
    pub fn as_bag(&self) -> Option<&BTreeMap<String, u64>> {
        match &self.value {
            AmountValue::Bag(bag) => Some(bag),
            AmountValue::Nat(_) => None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.value {
            AmountValue::Nat(v) => *v == 0,
            AmountValue::Bag(bag) => bag.is_empty(),
        }
    }

    /// `self + other`.
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.check_brand(other)?;
        let value = match (&self.value, &other.value) {
            (AmountValue::Nat(a), AmountValue::Nat(b)) => {
                AmountValue::Nat(a.checked_add(*b).ok_or(EscrowError::AmountOverflow)?)
            }
            (AmountValue::Bag(a), AmountValue::Bag(b)) => {
                let mut sum = a.clone();
                for (label, count) in b {
                    let slot = sum.entry(label.clone()).or_insert(0);
                    *slot = slot.checked_add(*count).ok_or(EscrowError::AmountOverflow)?;
                }
                AmountValue::Bag(sum)
            }
            _ => return Err(self.kind_error(other.value.kind())),
        };
        Ok(Self {
            brand: self.brand.clone(),
            value,
        })
    }

    /// `self - other`; fails with `Underflow` if any count would go negative.
    pub fn subtract(&self, other: &Self) -> Result<Self> {
        self.check_brand(other)?;
        let underflow = || EscrowError::Underflow {
            minuend: self.to_string(),
            subtrahend: other.to_string(),
        };
        let value = match (&self.value, &other.value) {
            (AmountValue::Nat(a), AmountValue::Nat(b)) => {
                AmountValue::Nat(a.checked_sub(*b).ok_or_else(underflow)?)
            }
            (AmountValue::Bag(a), AmountValue::Bag(b)) => {
                let mut diff = a.clone();
                for (label, count) in b {
                    let have = diff.get(label).copied().unwrap_or(0);
                    let left = have.checked_sub(*count).ok_or_else(underflow)?;
                    diff.insert(label.clone(), left);
                }
                AmountValue::Bag(diff).normalized()
            }
            _ => return Err(self.kind_error(other.value.kind())),
        };
        Ok(Self {
            brand: self.brand.clone(),
            value,
        })
    }

    /// `self >= other`, per label for bags.
    pub fn is_gte(&self, other: &Self) -> Result<bool> {
        self.check_brand(other)?;
        match (&self.value, &other.value) {
            (AmountValue::Nat(a), AmountValue::Nat(b)) => Ok(a >= b),
            (AmountValue::Bag(a), AmountValue::Bag(b)) => Ok(b
                .iter()
                .all(|(label, count)| a.get(label).copied().unwrap_or(0) >= *count)),
            _ => Err(self.kind_error(other.value.kind())),
        }
    }

    /// `self == other`, failing on a brand mismatch rather than returning false.
    pub fn is_equal(&self, other: &Self) -> Result<bool> {
        self.check_brand(other)?;
        Ok(self.value == other.value)
    }

    fn check_brand(&self, other: &Self) -> Result<()> {
        if self.brand != other.brand {
            return Err(EscrowError::BrandMismatch {
                expected: self.brand.name().to_string(),
                actual: other.brand.name().to_string(),
            });
        }
        Ok(())
    }

    fn kind_error(&self, actual: AssetKind) -> EscrowError {
        EscrowError::KindMismatch {
            brand: self.brand.name().to_string(),
            expected: self.brand.kind(),
            actual,
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            AmountValue::Nat(v) => write!(f, "{v} {}", self.brand),
            AmountValue::Bag(bag) => {
                write!(f, "{{")?;
                for (i, (label, count)) in bag.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{label}: {count}")?;
                }
                write!(f, "}} {}", self.brand)
            }
        }
    }
}

/// Build an [`AmountMap`] from `(keyword, amount)` pairs.
#[must_use]
pub fn amounts<const N: usize>(entries: [(&str, Amount); N]) -> AmountMap {
    entries
        .into_iter()
        .map(|(k, a)| (k.to_string(), a))
        .collect()
}

/// Sum every amount in the given records, per brand.
pub fn totals_by_brand<'a>(
    records: impl IntoIterator<Item = &'a AmountMap>,
) -> Result<BTreeMap<BrandId, Amount>> {
    let mut totals: BTreeMap<BrandId, Amount> = BTreeMap::new();
    for record in records {
        for amount in record.values() {
            let id = amount.brand().id();
            let next = match totals.get(&id) {
                Some(total) => total.add(amount)?,
                None => amount.clone(),
            };
            totals.insert(id, next);
        }
    }
    Ok(totals)
}

/// Seeded random allocations for property tests. **Never use in production.**
#[cfg(feature = "test-helpers")]
pub fn random_allocation(rng: &mut impl rand::Rng, brands: &[Brand], max: u128) -> Result<AmountMap> {
    let mut map = AmountMap::new();
    for (i, brand) in brands.iter().enumerate() {
        if rng.gen_bool(0.8) {
            let amount = match brand.kind() {
                AssetKind::Nat => Amount::nat(brand, rng.gen_range(0..=max))?,
                AssetKind::Bag => Amount::bag(brand, [("a", rng.gen_range(0..3)), ("b", rng.gen_range(0..3))])?,
            };
            map.insert(format!("K{i}"), amount);
        }
    }
    Ok(map)
}
