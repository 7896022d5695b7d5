//! Deposit-address directory.
//!
//! Contracts deliver invitations to parties by address. The directory
//! resolves an address to its deposit inbox or fails with
//! [`EscrowError::UnknownAddress`]; how addresses are registered is up to
//! the implementation.

use std::collections::BTreeMap;

use openescrow_engine::Invitation;
use openescrow_types::{EscrowError, Result};

/// Resolve-or-fail delivery of invitations to addresses.
pub trait AddressDirectory {
    /// Whether `address` has a deposit inbox.
    fn knows(&self, address: &str) -> bool;

    /// Deliver `invitation` to the inbox behind `address`.
    ///
    /// # Errors
    /// [`EscrowError::UnknownAddress`] if the address has no inbox.
    fn deposit(&mut self, address: &str, invitation: Invitation) -> Result<()>;
}

/// Directory backed by in-process inboxes.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    inboxes: BTreeMap<String, Vec<Invitation>>,
}

impl InMemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty inbox for `address` (no-op if it exists).
    pub fn register(&mut self, address: impl Into<String>) {
        self.inboxes.entry(address.into()).or_default();
    }

    pub fn inbox(&self, address: &str) -> Result<&[Invitation]> {
        self.inboxes
            .get(address)
            .map(Vec::as_slice)
            .ok_or_else(|| EscrowError::UnknownAddress(address.to_string()))
    }

    /// Take every invitation waiting at `address`.
    pub fn take_inbox(&mut self, address: &str) -> Result<Vec<Invitation>> {
        self.inboxes
            .get_mut(address)
            .map(std::mem::take)
            .ok_or_else(|| EscrowError::UnknownAddress(address.to_string()))
    }
}

impl AddressDirectory for InMemoryDirectory {
    fn knows(&self, address: &str) -> bool {
        self.inboxes.contains_key(address)
    }

    fn deposit(&mut self, address: &str, invitation: Invitation) -> Result<()> {
        let inbox = self
            .inboxes
            .get_mut(address)
            .ok_or_else(|| EscrowError::UnknownAddress(address.to_string()))?;
        tracing::debug!(%address, invitation = %invitation.id(), "invitation delivered");
        inbox.push(invitation);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use openescrow_engine::InvitationRegistry;
    use openescrow_types::InstanceId;

    use super::*;

    #[test]
    fn deliver_and_take() {
        let mut reg = InvitationRegistry::new(InstanceId::new());
        let inv = reg.issue("matchOffer", (), None, None);
        let mut dir = InMemoryDirectory::new();
        dir.register("agoric1bob");
        assert!(dir.knows("agoric1bob"));
        dir.deposit("agoric1bob", inv.clone()).unwrap();
        assert_eq!(dir.inbox("agoric1bob").unwrap(), &[inv.clone()]);
        assert_eq!(dir.take_inbox("agoric1bob").unwrap(), vec![inv]);
        assert!(dir.inbox("agoric1bob").unwrap().is_empty());
    }

    #[test]
    fn unknown_address() {
        let mut reg = InvitationRegistry::new(InstanceId::new());
        let inv = reg.issue("matchOffer", (), None, None);
        let mut dir = InMemoryDirectory::new();
        assert!(!dir.knows("nobody"));
        assert!(matches!(
            dir.deposit("nobody", inv),
            Err(EscrowError::UnknownAddress(a)) if a == "nobody"
        ));
        assert!(dir.take_inbox("nobody").is_err());
    }
}
