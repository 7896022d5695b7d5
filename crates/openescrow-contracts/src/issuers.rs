//! Asset issuer registry: symbolic asset name → [`Brand`].

use std::collections::BTreeMap;

use openescrow_types::{Brand, EscrowError, Result};

#[derive(Debug, Clone, Default)]
pub struct IssuerRegistry {
    brands: BTreeMap<String, Brand>,
    saved: u32,
}

impl IssuerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `brand` under its own name.
    ///
    /// # Errors
    /// `Configuration` if a different brand already holds the name.
    pub fn register(&mut self, brand: Brand) -> Result<()> {
        match self.brands.get(brand.name()) {
            Some(existing) if *existing != brand => Err(EscrowError::Configuration(format!(
                "issuer name {} already taken",
                brand.name()
            ))),
            Some(_) => Ok(()),
            None => {
                self.brands.insert(brand.name().to_string(), brand);
                Ok(())
            }
        }
    }

    /// Registry pre-loaded with `brands`.
    pub fn with_brands(brands: impl IntoIterator<Item = Brand>) -> Result<Self> {
        let mut registry = Self::new();
        for brand in brands {
            registry.register(brand)?;
        }
        Ok(registry)
    }

    pub fn resolve(&self, name: &str) -> Result<Brand> {
        self.brands
            .get(name)
            .cloned()
            .ok_or_else(|| EscrowError::UnknownIssuer(name.to_string()))
    }

    #[must_use]
    pub fn contains(&self, brand: &Brand) -> bool {
        self.brands.values().any(|b| b == brand)
    }

    /// Save a brand offered at runtime, returning the name it is known by.
    /// A brand whose name is taken by another is saved as `IssuerN`.
    pub fn save(&mut self, brand: &Brand) -> String {
        if let Some((name, _)) = self.brands.iter().find(|(_, b)| *b == brand) {
            return name.clone();
        }
        let name = if self.brands.contains_key(brand.name()) {
            self.saved += 1;
            format!("Issuer{}", self.saved)
        } else {
            brand.name().to_string()
        };
        tracing::info!(issuer = %name, brand = %brand.id(), "issuer saved");
        self.brands.insert(name.clone(), brand.clone());
        name
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.brands.keys().map(String::as_str)
    }
}
