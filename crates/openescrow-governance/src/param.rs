//! Governed parameter store.
//!
//! Every entry has a declared [`ParamType`] fixed at declaration, and its
//! value always matches that type. Outside this crate the store is
//! read-only: values change only when the contract governor applies the
//! outcome of a closed question.

use std::collections::BTreeMap;

use openescrow_types::{Amount, Brand, EscrowError, Result};
use serde::Serialize;

/// Declared type of a governed parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ParamType {
    /// An amount of a specific brand.
    Amount(Brand),
    Nat,
    String,
}

/// Value of a governed parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ParamValue {
    Amount(Amount),
    Nat(u128),
    String(String),
}

/// A proposed set of new values, keyed by parameter name.
pub type ParamChanges = BTreeMap<String, ParamValue>;

impl ParamType {
    /// Check `value` against this type.
    ///
    /// # Errors
    /// [`EscrowError::BadParameterShape`] naming `name`.
    pub fn check(&self, name: &str, value: &ParamValue) -> Result<()> {
        let bad = |reason: String| EscrowError::BadParameterShape {
            name: name.to_string(),
            reason,
        };
        match (self, value) {
            (Self::Amount(brand), ParamValue::Amount(amount)) => {
                if amount.brand() != brand {
                    return Err(bad(format!("expected an amount of {brand}, got {amount}")));
                }
                Ok(())
            }
            (Self::Nat, ParamValue::Nat(_)) | (Self::String, ParamValue::String(_)) => Ok(()),
            (expected, got) => Err(bad(format!("expected {}, got {}", expected.label(), got.label()))),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Amount(_) => "an amount",
            Self::Nat => "a natural number",
            Self::String => "a string",
        }
    }
}

impl ParamValue {
    fn label(&self) -> &'static str {
        match self {
            Self::Amount(_) => "an amount",
            Self::Nat(_) => "a natural number",
            Self::String(_) => "a string",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamEntry {
    pub param_type: ParamType,
    pub value: ParamValue,
}

/// Named, typed parameters of one governed contract instance.
#[derive(Debug, Clone, Default)]
pub struct ParamStore {
    entries: BTreeMap<String, ParamEntry>,
}

impl ParamStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter with its initial value.
    pub fn declare(
        &mut self,
        name: impl Into<String>,
        param_type: ParamType,
        initial: ParamValue,
    ) -> Result<()> {
        let name = name.into();
        param_type.check(&name, &initial)?;
        self.entries.insert(
            name,
            ParamEntry {
                param_type,
                value: initial,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&ParamValue> {
        self.entries
            .get(name)
            .map(|e| &e.value)
            .ok_or_else(|| EscrowError::UnknownParameter(name.to_string()))
    }

    pub fn get_amount(&self, name: &str) -> Result<Amount> {
        match self.get(name)? {
            ParamValue::Amount(amount) => Ok(amount.clone()),
            other => Err(EscrowError::BadParameterShape {
                name: name.to_string(),
                reason: format!("{} is not an amount", other.label()),
            }),
        }
    }

    pub fn get_nat(&self, name: &str) -> Result<u128> {
        match self.get(name)? {
            ParamValue::Nat(n) => Ok(*n),
            other => Err(EscrowError::BadParameterShape {
                name: name.to_string(),
                reason: format!("{} is not a natural number", other.label()),
            }),
        }
    }

    pub fn get_string(&self, name: &str) -> Result<&str> {
        match self.get(name)? {
            ParamValue::String(s) => Ok(s),
            other => Err(EscrowError::BadParameterShape {
                name: name.to_string(),
                reason: format!("{} is not a string", other.label()),
            }),
        }
    }

    /// Check a proposed change set without applying it.
    ///
    /// # Errors
    /// `UnknownParameter` for an undeclared name, `BadParameterShape` for an
    /// empty change set or a value of the wrong type.
    pub fn validate(&self, changes: &ParamChanges) -> Result<()> {
        if changes.is_empty() {
            return Err(EscrowError::BadParameterShape {
                name: String::new(),
                reason: "empty change set".to_string(),
            });
        }
        for (name, value) in changes {
            let entry = self
                .entries
                .get(name)
                .ok_or_else(|| EscrowError::UnknownParameter(name.clone()))?;
            entry.param_type.check(name, value)?;
        }
        Ok(())
    }

    /// Write every value of `changes`, or none of them.
    pub(crate) fn apply(&mut self, changes: &ParamChanges) -> Result<()> {
        self.validate(changes)?;
        for (name, value) in changes {
            if let Some(entry) = self.entries.get_mut(name) {
                entry.value = value.clone();
            }
        }
        Ok(())
    }

    /// Current value of every parameter.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, ParamValue> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.value.clone()))
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
