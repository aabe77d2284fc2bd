//! Physical stock counts and reconciliation.
//!
//! A count freezes per-item system quantities at open time; recorded counts
//! compute variance against that snapshot, and reconciliation posts one
//! `CountCorrection` per non-zero-variance line so the projection matches
//! what was physically counted.

pub mod count;
pub mod engine;

pub use count::{CountId, CountLine, CountStatus, StockCount, VarianceSummary};
pub use engine::CountEngine;
