//! Stock ledger and level projection.
//!
//! Truth lives in the append-only ledger; the per-(item, warehouse)
//! `StockLevel` is a recomputable, version-guarded projection over it. The
//! engine's core invariant: the projection quantity always equals the ledger
//! sum for the pair, and is never negative.

pub mod book;
pub mod movement;

pub use book::{StockBook, StockLevel, MAX_POST_RETRIES};
pub use movement::{
    LedgerEntry, MovementFilter, MovementId, MovementReason, MovementReference, NewMovement,
};
