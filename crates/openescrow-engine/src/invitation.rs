//! Invitations: single-use capabilities to make an offer.
//!
//! An [`Invitation`] is a handle into the issuing instance's
//! [`InvitationRegistry`]. Handles may be cloned and passed around, but all
//! clones share one redemption: the registry entry is burned the first time
//! any clone is redeemed, and every later attempt fails with
//! [`EscrowError::AlreadyRedeemed`].

use openescrow_types::{EscrowError, InstanceId, InvitationId, Proposal, ProposalShape, Result};
use serde::Serialize;

/// Handle to an invitation. Only a registry can mint one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Invitation {
    id: InvitationId,
    instance: InstanceId,
}

impl Invitation {
    #[must_use]
    pub fn id(&self) -> InvitationId {
        self.id
    }

    #[must_use]
    pub fn instance(&self) -> InstanceId {
        self.instance
    }
}

/// Public description of an invitation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvitationDetails {
    pub id: InvitationId,
    pub instance: InstanceId,
    pub description: String,
    /// Terms the issuer attached for the invitee to inspect, e.g. the first
    /// party's proposal on a match invitation.
    pub custom: Option<Proposal>,
    pub redeemed: bool,
}

#[derive(Debug, Clone)]
struct InvitationRecord<H> {
    description: String,
    handler: H,
    shape: Option<ProposalShape>,
    custom: Option<Proposal>,
    burned: bool,
}

/// The invitations issued by one contract instance, each bound to the
/// handler `H` that processes the offer it admits.
#[derive(Debug)]
pub struct InvitationRegistry<H> {
    instance: InstanceId,
    records: Vec<InvitationRecord<H>>,
}

impl<H: Clone> InvitationRegistry<H> {
    #[must_use]
    pub fn new(instance: InstanceId) -> Self {
        Self {
            instance,
            records: Vec::new(),
        }
    }

    /// Issue a fresh invitation.
    pub fn issue(
        &mut self,
        description: impl Into<String>,
        handler: H,
        shape: Option<ProposalShape>,
        custom: Option<Proposal>,
    ) -> Invitation {
        let id = InvitationId(self.records.len());
        self.records.push(InvitationRecord {
            description: description.into(),
            handler,
            shape,
            custom,
            burned: false,
        });
        Invitation {
            id,
            instance: self.instance,
        }
    }

    fn record(&self, invitation: &Invitation) -> Result<&InvitationRecord<H>> {
        if invitation.instance != self.instance {
            return Err(EscrowError::ForeignInvitation(invitation.id));
        }
        self.records
            .get(invitation.id.0)
            .ok_or(EscrowError::InvitationNotFound(invitation.id))
    }

    pub fn describe(&self, invitation: &Invitation) -> Result<InvitationDetails> {
        let record = self.record(invitation)?;
        Ok(InvitationDetails {
            id: invitation.id,
            instance: self.instance,
            description: record.description.clone(),
            custom: record.custom.clone(),
            redeemed: record.burned,
        })
    }

    /// Validate that the invitation can be redeemed right now and return the
    /// offer shape it imposes. Does not burn it.
    pub fn check_redeemable(&self, invitation: &Invitation) -> Result<Option<&ProposalShape>> {
        let record = self.record(invitation)?;
        if record.burned {
            return Err(EscrowError::AlreadyRedeemed(invitation.id));
        }
        Ok(record.shape.as_ref())
    }

    /// Handler of an invitation that can still be redeemed.
    pub fn pending_handler(&self, invitation: &Invitation) -> Result<&H> {
        self.check_redeemable(invitation)?;
        Ok(&self.record(invitation)?.handler)
    }

    /// Burn the invitation, returning its handler.
    pub fn burn(&mut self, invitation: &Invitation) -> Result<H> {
        self.check_redeemable(invitation)?;
        let record = self
            .records
            .get_mut(invitation.id.0)
            .ok_or(EscrowError::InvitationNotFound(invitation.id))?;
        record.burned = true;
        Ok(record.handler.clone())
    }

    pub fn is_redeemed(&self, invitation: &Invitation) -> Result<bool> {
        Ok(self.record(invitation)?.burned)
    }

    /// Number of invitations not yet redeemed.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.records.iter().filter(|r| !r.burned).count()
    }
}
