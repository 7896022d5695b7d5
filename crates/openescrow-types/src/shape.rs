//! Proposal shapes: structural patterns over proposals.
//!
//! A [`Shape`] is a closed set of pattern nodes interpreted by one recursive
//! matcher ([`Shape::check`]). Leaf nodes constrain a single [`Amount`];
//! [`Shape::Record`] constrains a keyword record and recurses into its fields.
//! Key comparison is order-independent. A closed record rejects both missing
//! and extra keys; an open record only rejects missing ones.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{Amount, AmountMap, AmountValue, Brand, EscrowError, ExitRule, Keyword, Proposal, Result};

/// What a shape is matched against.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    Amount(&'a Amount),
    Record(&'a AmountMap),
}

/// A pattern node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Shape {
    /// Matches anything.
    Any,
    /// Exactly this amount.
    Literal(Amount),
    /// A fungible amount of `brand` with `min <= value <= max`.
    NatRange {
        brand: Brand,
        min: u128,
        max: Option<u128>,
    },
    /// Any amount of `brand`.
    BrandOf(Brand),
    /// An amount of the same brand that is `>=` the given one.
    AtLeast(Amount),
    /// A keyword record. `open` records tolerate extra keys.
    Record {
        fields: BTreeMap<Keyword, Shape>,
        open: bool,
    },
}

impl Shape {
    /// Closed record: exactly these keys.
    #[must_use]
    pub fn exact_record(fields: impl IntoIterator<Item = (Keyword, Shape)>) -> Self {
        Self::Record {
            fields: fields.into_iter().collect(),
            open: false,
        }
    }

    /// Open record: at least these keys.
    #[must_use]
    pub fn split_record(fields: impl IntoIterator<Item = (Keyword, Shape)>) -> Self {
        Self::Record {
            fields: fields.into_iter().collect(),
            open: true,
        }
    }

    /// Whether `subject` matches this shape.
    #[must_use]
    pub fn matches(&self, subject: Subject<'_>) -> bool {
        self.check(subject, "").is_ok()
    }

    /// Match `subject`, reporting the first mismatch with its path.
    pub fn check(&self, subject: Subject<'_>, path: &str) -> Result<()> {
        match (self, subject) {
            (Self::Any, _) => Ok(()),
            (Self::Record { fields, open }, Subject::Record(record)) => {
                for (key, field_shape) in fields {
                    let child_path = join(path, key);
                    let Some(amount) = record.get(key) else {
                        return Err(mismatch(&child_path, "missing required key"));
                    };
                    field_shape.check(Subject::Amount(amount), &child_path)?;
                }
                if !open {
                    if let Some(extra) = record.keys().find(|k| !fields.contains_key(*k)) {
                        return Err(mismatch(&join(path, extra), "unexpected key"));
                    }
                }
                Ok(())
            }
            (Self::Record { .. }, Subject::Amount(amount)) => {
                Err(mismatch(path, &format!("expected a record, got {amount}")))
            }
            (_, Subject::Record(_)) => Err(mismatch(path, "expected an amount, got a record")),
            (Self::Literal(expected), Subject::Amount(amount)) => {
                if expected == amount {
                    Ok(())
                } else {
                    Err(mismatch(path, &format!("expected exactly {expected}, got {amount}")))
                }
            }
            (Self::NatRange { brand, min, max }, Subject::Amount(amount)) => {
                check_brand(brand, amount, path)?;
                let AmountValue::Nat(value) = *amount.value() else {
                    return Err(mismatch(path, "expected a fungible amount"));
                };
                if value < *min {
                    return Err(mismatch(path, &format!("{amount} is below minimum {min}")));
                }
                if let Some(max) = max {
                    if value > *max {
                        return Err(mismatch(path, &format!("{amount} is above maximum {max}")));
                    }
                }
                Ok(())
            }
            (Self::BrandOf(brand), Subject::Amount(amount)) => check_brand(brand, amount, path),
            (Self::AtLeast(floor), Subject::Amount(amount)) => {
                check_brand(floor.brand(), amount, path)?;
                if amount.is_gte(floor)? {
                    Ok(())
                } else {
                    Err(mismatch(path, &format!("{amount} is less than {floor}")))
                }
            }
        }
    }
}

/// Which exit rules a proposal may carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ExitShape {
    #[default]
    Any,
    OnDemand,
    Waived,
    AfterDeadline,
}

impl ExitShape {
    #[must_use]
    pub fn admits(self, exit: &ExitRule) -> bool {
        matches!(
            (self, exit),
            (Self::Any, _)
                | (Self::OnDemand, ExitRule::OnDemand)
                | (Self::Waived, ExitRule::Waived)
                | (Self::AfterDeadline, ExitRule::AfterDeadline(_))
        )
    }
}

/// Constraint on a whole proposal attached to an invitation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposalShape {
    pub give: Shape,
    pub want: Shape,
    pub exit: ExitShape,
}

impl ProposalShape {
    /// Accepts every proposal.
    #[must_use]
    pub fn any() -> Self {
        Self {
            give: Shape::Any,
            want: Shape::Any,
            exit: ExitShape::Any,
        }
    }

    /// Constrain only `give`.
    #[must_use]
    pub fn give(give: Shape) -> Self {
        Self {
            give,
            ..Self::any()
        }
    }

    pub fn check(&self, proposal: &Proposal) -> Result<()> {
        self.give.check(Subject::Record(&proposal.give), "give")?;
        self.want.check(Subject::Record(&proposal.want), "want")?;
        if !self.exit.admits(&proposal.exit) {
            return Err(mismatch("exit", &format!("{} not allowed", proposal.exit)));
        }
        Ok(())
    }
}

fn check_brand(brand: &Brand, amount: &Amount, path: &str) -> Result<()> {
    if amount.brand() == brand {
        Ok(())
    } else {
        Err(mismatch(
            path,
            &format!("expected brand {brand}, got {}", amount.brand()),
        ))
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn mismatch(path: &str, what: &str) -> EscrowError {
    EscrowError::ShapeMismatch {
        reason: format!("{path}: {what}"),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::amounts;

    fn setup() -> (Brand, Brand) {
        (Brand::dummy_nat("IST"), Brand::dummy_nat("Beans"))
    }

    #[test]
    fn nat_range_bounds() {
        let (ist, _) = setup();
        let shape = Shape::NatRange {
            brand: ist.clone(),
            min: 2,
            max: Some(5),
        };
        for (v, ok) in [(1, false), (2, true), (5, true), (6, false)] {
            let a = Amount::nat(&ist, v).unwrap();
            assert_eq!(shape.matches(Subject::Amount(&a)), ok, "value {v}");
        }
    }

    #[test]
    fn brand_checked_by_leaf_shapes() {
        let (ist, beans) = setup();
        let a = Amount::nat(&beans, 3).unwrap();
        assert!(!Shape::BrandOf(ist.clone()).matches(Subject::Amount(&a)));
        assert!(Shape::BrandOf(beans.clone()).matches(Subject::Amount(&a)));
        let floor = Amount::nat(&ist, 1).unwrap();
        assert!(!Shape::AtLeast(floor).matches(Subject::Amount(&a)));
    }

    #[test]
    fn literal_requires_equality() {
        let (ist, _) = setup();
        let one = Amount::nat(&ist, 1).unwrap();
        let two = Amount::nat(&ist, 2).unwrap();
        assert!(Shape::Literal(one.clone()).matches(Subject::Amount(&one)));
        assert!(!Shape::Literal(one).matches(Subject::Amount(&two)));
    }

    #[test]
    fn closed_record_rejects_subset_and_superset() {
        let (ist, beans) = setup();
        let shape = Shape::exact_record([
            ("Price".to_string(), Shape::BrandOf(ist.clone())),
            ("Beans".to_string(), Shape::BrandOf(beans.clone())),
        ]);
        let exact = amounts([
            ("Beans", Amount::nat(&beans, 1).unwrap()),
            ("Price", Amount::nat(&ist, 1).unwrap()),
        ]);
        assert!(shape.matches(Subject::Record(&exact)));

        let subset = amounts([("Price", Amount::nat(&ist, 1).unwrap())]);
        let err = shape.check(Subject::Record(&subset), "give").unwrap_err();
        assert!(err.to_string().contains("give.Beans"), "{err}");

        let mut superset = exact.clone();
        superset.insert("Extra".into(), Amount::nat(&ist, 1).unwrap());
        let err = shape.check(Subject::Record(&superset), "give").unwrap_err();
        assert!(err.to_string().contains("give.Extra"), "{err}");
    }

    #[test]
    fn open_record_tolerates_extra_keys() {
        let (ist, beans) = setup();
        let shape = Shape::split_record([(
            "Fee".to_string(),
            Shape::NatRange {
                brand: ist.clone(),
                min: 1,
                max: None,
            },
        )]);
        let give = amounts([
            ("Fee", Amount::nat(&ist, 1).unwrap()),
            ("Beans", Amount::nat(&beans, 10).unwrap()),
        ]);
        assert!(shape.matches(Subject::Record(&give)));
        let no_fee = amounts([("Beans", Amount::nat(&beans, 10).unwrap())]);
        assert!(!shape.matches(Subject::Record(&no_fee)));
    }

    #[test]
    fn nested_record_in_record_position() {
        let (ist, _) = setup();
        let a = Amount::nat(&ist, 1).unwrap();
        assert!(!Shape::exact_record([]).matches(Subject::Amount(&a)));
        let rec = amounts([("Fee", a)]);
        assert!(!Shape::BrandOf(ist).matches(Subject::Record(&rec)));
        assert!(Shape::Any.matches(Subject::Record(&rec)));
    }

    #[test]
    fn proposal_shape_checks_exit() {
        let (ist, _) = setup();
        let proposal = Proposal::new(amounts([("Fee", Amount::nat(&ist, 1).unwrap())]), AmountMap::new())
            .with_exit(ExitRule::AfterDeadline(Utc::now()));
        let mut shape = ProposalShape::give(Shape::split_record([(
            "Fee".to_string(),
            Shape::BrandOf(ist),
        )]));
        assert!(shape.check(&proposal).is_ok());
        shape.exit = ExitShape::OnDemand;
        let err = shape.check(&proposal).unwrap_err();
        assert!(matches!(err, EscrowError::ShapeMismatch { .. }));
    }
}
