//! Identifiers used throughout OpenEscrow.
//!
//! Long-lived entities (brands, contract instances, committees) use UUIDv7.
//! Seats and invitations are indices into per-instance arenas so lookups are
//! O(1); they are only meaningful together with the owning [`InstanceId`].

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// BrandId
// ---------------------------------------------------------------------------

/// Identity of an asset class. Never constructed from outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize)]
pub struct BrandId(pub(crate) Uuid);

impl BrandId {
    pub(crate) fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Short hex prefix for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0.as_bytes()[12..])
    }
}

impl fmt::Display for BrandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "brand:{}", self.short())
    }
}

// ---------------------------------------------------------------------------
// InstanceId
// ---------------------------------------------------------------------------

/// A running contract instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct InstanceId(pub Uuid);

impl InstanceId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SeatId
// ---------------------------------------------------------------------------

/// Index of an escrow position in its instance's seat ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SeatId(pub usize);

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seat:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// InvitationId
// ---------------------------------------------------------------------------

/// Index of an invitation record in its instance's invitation registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct InvitationId(pub usize);

impl fmt::Display for InvitationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inv:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// CommitteeId / VoterId
// ---------------------------------------------------------------------------

/// An electorate: the set of voters entitled to decide questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct CommitteeId(pub Uuid);

impl CommitteeId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for CommitteeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommitteeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "committee:{}", self.0)
    }
}

/// Seat number of a voter within its committee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct VoterId(pub u32);

impl fmt::Display for VoterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Voter{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// QuestionHandle
// ---------------------------------------------------------------------------

/// Handle of a governance question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct QuestionHandle(pub Uuid);

impl QuestionHandle {
    /// Deterministic handle from the committee and the question's sequence
    /// number, so replaying the same submissions yields the same handles.
    #[must_use]
    pub fn deterministic(committee: CommitteeId, sequence: u64) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"openescrow:question:v1:");
        hasher.update(committee.0.as_bytes());
        hasher.update(sequence.to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash[..16]);
        Self(Uuid::from_bytes(bytes))
    }
}

impl fmt::Display for QuestionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "question:{}", self.0)
    }
}
