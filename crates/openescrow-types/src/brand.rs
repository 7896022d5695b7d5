//! Brands: unforgeable tags identifying an asset class.
//!
//! A [`Brand`] can only be created through [`Brand::issue`] (or its
//! [`Brand::fungible`] shorthand), which mints a fresh identity. Two brands
//! with the same name are still different brands. Brands serialize (for logs
//! and published snapshots) but never deserialize,
//! so a brand cannot be forged from bytes.

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

use crate::{BrandId, constants};

/// Whether amounts of a brand are fungible counts or labeled multisets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    /// Fungible: a non-negative integer of base units.
    Nat,
    /// Non-fungible: a bag of labeled units with per-label counts.
    Bag,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nat => write!(f, "NAT"),
            Self::Bag => write!(f, "BAG"),
        }
    }
}

/// An asset class. Equality, ordering and hashing use the identity only.
#[derive(Debug, Clone, Serialize)]
pub struct Brand {
    id: BrandId,
    name: String,
    kind: AssetKind,
    /// Display precision: base units per display unit is `10^decimal_places`.
    decimal_places: u32,
}

impl Brand {
    /// Issue a brand for a new asset class.
    #[must_use]
    pub fn issue(name: impl Into<String>, kind: AssetKind, decimal_places: u32) -> Self {
        Self {
            id: BrandId::new(),
            name: name.into(),
            kind,
            decimal_places,
        }
    }

    /// Fungible brand at the default display precision.
    #[must_use]
    pub fn fungible(name: impl Into<String>) -> Self {
        Self::issue(name, AssetKind::Nat, constants::DEFAULT_DECIMAL_PLACES)
    }

    #[must_use]
    pub fn id(&self) -> BrandId {
        self.id
    }

    /// Human-readable allegedName. Not an identity.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    #[must_use]
    pub fn decimal_places(&self) -> u32 {
        self.decimal_places
    }
}

impl PartialEq for Brand {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Brand {}

impl Hash for Brand {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Brand {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Brand {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Fixture brands for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Brand {
    /// Fungible brand with no decimal places.
    pub fn dummy_nat(name: &str) -> Self {
        Self::issue(name, AssetKind::Nat, 0)
    }

    /// Bag-valued brand.
    pub fn dummy_bag(name: &str) -> Self {
        Self::issue(name, AssetKind::Bag, 0)
    }
}
