//! # Economy Error Types
//!
//! All errors that can occur in the economy.
//!
//! Everything except `Storage` and `Corrupt` is an expected business
//! outcome: a structured answer to a request the system understood but
//! refused. Storage failures mean a valid request could not be completed
//! and are surfaced distinctly so callers can tell the two apart.

use thiserror::Error;

/// Errors that can occur in the economy.
#[derive(Error, Debug)]
pub enum EconomyError {
    /// Malformed or missing input; nothing was mutated.
    #[error("invalid parameters: {reason}")]
    InvalidParameters {
        /// What was wrong with the request.
        reason: String,
    },

    /// The account cannot cover the requested debit.
    #[error("insufficient funds: need {required} coins, have {available}")]
    InsufficientFunds {
        /// Coins the operation required.
        required: u64,
        /// Coins the account holds.
        available: u64,
    },

    /// The account does not hold enough of the item.
    #[error("insufficient inventory: need {required} of {item_id}, have {available}")]
    InsufficientInventory {
        /// The item that was short.
        item_id: String,
        /// The quantity required.
        required: u32,
        /// The quantity held.
        available: u32,
    },

    /// A referenced account or listing does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// The missing reference.
        what: String,
    },

    /// A listing transition was requested but the listing is not open.
    #[error("invalid state: {reason}")]
    InvalidState {
        /// Why the transition was refused.
        reason: String,
    },

    /// The actor does not own the listing.
    #[error("not the owner of this listing")]
    NotOwner,

    /// The buyer is the seller.
    #[error("buyer and seller are the same account")]
    SelfTrade,

    /// The payment provider could not be reached or verified.
    #[error("payment provider unavailable: {reason}")]
    UpstreamUnavailable {
        /// What the bridge reported.
        reason: String,
    },

    /// Arithmetic overflow in a currency or inventory calculation.
    #[error("arithmetic overflow in economic calculation")]
    ArithmeticOverflow,

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Durable state could not be read or written; the operation did not
    /// commit and should be retried once storage recovers.
    #[error("storage failure during {op}: {source}")]
    Storage {
        /// The storage step that failed.
        op: &'static str,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The durable snapshot exists but cannot be decoded.
    #[error("corrupt economy snapshot: {reason}")]
    Corrupt {
        /// Decoder detail.
        reason: String,
    },
}

impl EconomyError {
    /// True for expected business outcomes, false for storage faults.
    #[must_use]
    pub fn is_business(&self) -> bool {
        !matches!(self, Self::Storage { .. } | Self::Corrupt { .. })
    }

    /// Shorthand for an [`EconomyError::InvalidParameters`].
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidParameters {
            reason: reason.into(),
        }
    }

    /// Shorthand for an [`EconomyError::NotFound`].
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }
}

/// Result type for economy operations.
pub type EconomyResult<T> = Result<T, EconomyError>;
