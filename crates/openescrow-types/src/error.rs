//! Error types for OpenEscrow.
//!
//! All errors use the `OE_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Amount algebra errors
//! - 2xx: Escrow / seat errors
//! - 3xx: Offer matching errors
//! - 4xx: Governance errors
//! - 8xx: Invariant violations
//! - 9xx: General / internal errors

use thiserror::Error;

use crate::{AssetKind, CommitteeId, InvitationId, QuestionHandle, SeatId, VoterId};

/// Central error enum for all OpenEscrow operations.
#[derive(Debug, Error)]
pub enum EscrowError {
    // =================================================================
    // Amount Errors (1xx)
    // =================================================================
    /// Two amounts (or an amount and a shape) belong to different brands.
    #[error("OE_ERR_100: Brand mismatch: expected {expected}, got {actual}")]
    BrandMismatch { expected: String, actual: String },

    /// Subtraction would produce a negative value.
    #[error("OE_ERR_101: Amount underflow: cannot subtract {subtrahend} from {minuend}")]
    Underflow { minuend: String, subtrahend: String },

    /// Addition exceeded the representable range.
    #[error("OE_ERR_102: Amount overflow")]
    AmountOverflow,

    /// A value of the wrong asset kind was supplied for a brand.
    #[error("OE_ERR_103: Asset kind mismatch for {brand}: expected {expected}, got {actual}")]
    KindMismatch {
        brand: String,
        expected: AssetKind,
        actual: AssetKind,
    },

    /// A display-unit value could not be represented in base units.
    #[error("OE_ERR_104: Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    // =================================================================
    // Escrow Errors (2xx)
    // =================================================================
    /// A rearrangement would drive a seat's allocation negative.
    #[error("OE_ERR_200: Insufficient funds in {seat} for {keyword}: need {needed}, have {available}")]
    InsufficientFunds {
        seat: SeatId,
        keyword: String,
        needed: String,
        available: String,
    },

    /// No seat with this index exists in the ledger.
    #[error("OE_ERR_201: Seat not found: {0}")]
    SeatNotFound(SeatId),

    /// The seat has already exited or failed.
    #[error("OE_ERR_202: Seat {seat} is {state}, not ACTIVE")]
    SeatNotActive { seat: SeatId, state: String },

    /// The seat's exit rule does not allow the requested exit.
    #[error("OE_ERR_203: Exit not allowed for {seat}: {reason}")]
    ExitNotAllowed { seat: SeatId, reason: String },

    // =================================================================
    // Offer Matching Errors (3xx)
    // =================================================================
    /// A proposal did not satisfy the required shape.
    #[error("OE_ERR_300: Shape mismatch: {reason}")]
    ShapeMismatch { reason: String },

    /// The invitation has already been redeemed.
    #[error("OE_ERR_301: Invitation already redeemed: {0}")]
    AlreadyRedeemed(InvitationId),

    /// No invitation with this index exists in the registry.
    #[error("OE_ERR_302: Invitation not found: {0}")]
    InvitationNotFound(InvitationId),

    /// The deposited payments do not equal the proposal's `give`.
    #[error("OE_ERR_303: Payment mismatch: {reason}")]
    PaymentMismatch { reason: String },

    /// The address directory has no deposit facet for this address.
    #[error("OE_ERR_304: Unknown address: {0}")]
    UnknownAddress(String),

    /// The issuer registry has no brand with this name.
    #[error("OE_ERR_305: Unknown issuer: {0}")]
    UnknownIssuer(String),

    /// The invitation was issued by a different contract instance.
    #[error("OE_ERR_306: Invitation {0} belongs to another instance")]
    ForeignInvitation(InvitationId),

    // =================================================================
    // Governance Errors (4xx)
    // =================================================================
    /// A question is already open for this governed instance.
    #[error("OE_ERR_400: Question already open: {0}")]
    QuestionAlreadyOpen(QuestionHandle),

    /// The question's deadline has passed; no more votes are accepted.
    #[error("OE_ERR_401: Voting closed for {0}")]
    VotingClosed(QuestionHandle),

    /// A proposed value does not match the parameter's declared type.
    #[error("OE_ERR_402: Bad parameter shape for {name}: {reason}")]
    BadParameterShape { name: String, reason: String },

    /// No governed parameter with this name.
    #[error("OE_ERR_403: Unknown parameter: {0}")]
    UnknownParameter(String),

    /// No question with this handle.
    #[error("OE_ERR_404: Question not found: {0}")]
    QuestionNotFound(QuestionHandle),

    /// The governed instance has no open question.
    #[error("OE_ERR_405: No question open")]
    NoQuestionOpen,

    /// The chosen position index is not one of the question's positions.
    #[error("OE_ERR_406: Invalid position {index} for {question}")]
    InvalidPosition {
        question: QuestionHandle,
        index: usize,
    },

    /// Tallying was requested before the question's deadline.
    #[error("OE_ERR_407: Voting still open for {0}")]
    VotingStillOpen(QuestionHandle),

    /// The capability does not name a voter of this committee.
    #[error("OE_ERR_408: {voter} is not a voter of {committee}")]
    NotAVoter {
        voter: VoterId,
        committee: CommitteeId,
    },

    // =================================================================
    // Invariant Violations (8xx)
    // =================================================================
    /// Supply conservation invariant violated. Fatal for the instance.
    #[error("OE_ERR_800: Conservation violation: {reason}")]
    ConservationViolation { reason: String },

    /// The instance was halted after an invariant violation.
    #[error("OE_ERR_801: Contract halted: {reason}")]
    ContractHalted { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("OE_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("OE_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config, missing fields, etc.).
    #[error("OE_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

impl EscrowError {
    /// Whether this error must abort the whole contract instance.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConservationViolation { .. })
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, EscrowError>;

impl From<serde_json::Error> for EscrowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = EscrowError::SeatNotFound(SeatId(4));
        let msg = format!("{err}");
        assert!(msg.starts_with("OE_ERR_201"), "Got: {msg}");
        assert!(msg.contains("seat:4"));
    }

    #[test]
    fn insufficient_funds_display() {
        let err = EscrowError::InsufficientFunds {
            seat: SeatId(1),
            keyword: "Fee".into(),
            needed: "5".into(),
            available: "2".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("OE_ERR_200"));
        assert!(msg.contains("Fee"));
        assert!(msg.contains('5'));
        assert!(msg.contains('2'));
    }

    #[test]
    fn only_conservation_violation_is_fatal() {
        assert!(
            EscrowError::ConservationViolation {
                reason: "x".into()
            }
            .is_fatal()
        );
        assert!(!EscrowError::NoQuestionOpen.is_fatal());
        assert!(!EscrowError::AlreadyRedeemed(InvitationId(0)).is_fatal());
    }

    #[test]
    fn all_errors_have_oe_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(EscrowError::AmountOverflow),
            Box::new(EscrowError::NoQuestionOpen),
            Box::new(EscrowError::ShapeMismatch {
                reason: "test".into(),
            }),
            Box::new(EscrowError::Internal("test".into())),
            Box::new(EscrowError::KindMismatch {
                brand: "IST".into(),
                expected: AssetKind::Nat,
                actual: AssetKind::Bag,
            }),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("OE_ERR_"),
                "Error missing OE_ERR_ prefix: {msg}"
            );
        }
    }

    #[test]
    fn serde_json_error_converts() {
        let parse: std::result::Result<u32, _> = serde_json::from_str("not json");
        let err: EscrowError = parse.unwrap_err().into();
        assert!(matches!(err, EscrowError::Serialization(_)));
    }
}
