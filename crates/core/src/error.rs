//! Domain error model.

use thiserror::Error;

/// Result type used across the stock-control domain.
pub type StockResult<T> = Result<T, StockError>;

/// Stock-control domain error.
///
/// `InsufficientStock` and `ConcurrentModification` are expected operational
/// outcomes and must be surfaced to the caller as structured results, never
/// swallowed. `InvariantViolation` is fatal for the affected stock level:
/// writes are refused until the pair is repaired.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    /// A negative-resulting movement was rejected. Recoverable: the caller
    /// adjusts the quantity or target warehouse.
    #[error(
        "insufficient stock for item {item} at warehouse {warehouse}: \
         on hand {on_hand}, attempted delta {attempted} ({reason})"
    )]
    InsufficientStock {
        item: String,
        warehouse: String,
        on_hand: i64,
        attempted: i64,
        reason: String,
    },

    /// The optimistic-retry budget was exhausted. Recoverable via caller retry.
    #[error("concurrent modification: retry budget exhausted after {retries} attempts")]
    ConcurrentModification { retries: u32 },

    /// A transfer/count state-machine violation. A usage error, not retryable.
    #[error("invalid state transition: {from} -> {attempted}")]
    InvalidStateTransition { from: String, attempted: String },

    /// A requested item/warehouse/transfer/count was not found.
    #[error("{0} not found")]
    NotFound(String),

    /// The projection disagrees with the ledger sum (or an internal guard
    /// failed). Fatal for the affected pair.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A value failed validation (e.g. zero delta, empty name).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A uniqueness conflict (e.g. duplicate SKU).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl StockError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(kind: impl Into<String>) -> Self {
        Self::NotFound(kind.into())
    }

    pub fn invalid_transition(from: impl ToString, attempted: impl ToString) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            attempted: attempted.to_string(),
        }
    }

    /// True for errors a caller may retry or correct and resubmit.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientStock { .. } | Self::ConcurrentModification { .. }
        )
    }
}
