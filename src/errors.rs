//! Unified error type for the mess ledger.
//!
//! Every business-rule violation is a distinct variant so callers can map it to their
//! own presentation (HTTP status, UI message) without parsing strings.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// All failures the ledger core can report.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Underlying store failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O failure outside the store (config files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Tenant does not exist or was soft-deleted
    #[error("Mess not found: {id}")]
    TenantNotFound {
        /// Requested tenant id
        id: i64,
    },

    /// Member does not exist in the tenant
    #[error("Member not found: {id}")]
    MemberNotFound {
        /// Requested member id
        id: i64,
    },

    /// A meal entry, bazar record, expense, payment or token is absent
    #[error("{kind} not found: {id}")]
    RecordNotFound {
        /// Record kind, e.g. `"meal entry"`
        kind: &'static str,
        /// Requested id
        id: i64,
    },

    /// Caller lacks the role or membership required
    #[error("Unauthorized: {reason}")]
    Unauthorized {
        /// Why the capability check failed
        reason: String,
    },

    /// Uniqueness violation
    #[error("Duplicate {kind}: {detail}")]
    DuplicateEntry {
        /// Record kind
        kind: &'static str,
        /// Identifying detail
        detail: String,
    },

    /// Entry window for the date has closed
    #[error("Meal entry window closed for {date}")]
    WindowClosed {
        /// Date the caller tried to write
        date: NaiveDate,
    },

    /// Lock attempted before the cutoff without force
    #[error("Meal entry window still open for {date}")]
    WindowStillOpen {
        /// Date the caller tried to lock
        date: NaiveDate,
    },

    /// Meal entry is locked
    #[error("Meal entry {id} is locked")]
    Locked {
        /// Entry id
        id: i64,
    },

    /// Approved record cannot be changed by this caller
    #[error("{kind} {id} is approved and can only be changed by a manager")]
    Immutable {
        /// Record kind
        kind: &'static str,
        /// Record id
        id: i64,
    },

    /// Declared total does not match the item list
    #[error("Total cost mismatch: items sum to {computed}, declared {provided}")]
    CostMismatch {
        /// Sum of quantity × unit price
        computed: Decimal,
        /// Total supplied by the caller
        provided: Decimal,
    },

    /// Token signature did not verify
    #[error("Invalid token signature")]
    InvalidSignature,

    /// Token is past its expiry
    #[error("Token expired")]
    Expired,

    /// Token reached its usage cap
    #[error("Token usage exhausted")]
    Exhausted,

    /// Record was already approved
    #[error("{kind} {id} is already approved")]
    AlreadyApproved {
        /// Record kind
        kind: &'static str,
        /// Record id
        id: i64,
    },

    /// Status transition not allowed from the current state
    #[error("Cannot move {kind} from {from} to {to}")]
    InvalidTransition {
        /// Record kind
        kind: &'static str,
        /// Current state
        from: String,
        /// Requested state
        to: String,
    },

    /// Input outside the accepted domain
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of the offending value
        message: String,
    },
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for an [`Error::Unauthorized`] with a message.
    pub(crate) fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Shorthand for an [`Error::InvalidInput`] with a message.
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}
