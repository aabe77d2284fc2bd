//! Inter-warehouse stock transfers.
//!
//! A transfer is an explicit entity with a state machine, not a best-effort
//! pair of updates: every line posts one `TransferOut` and one `TransferIn`,
//! and a failed attempt compensates already-posted legs before surfacing.

pub mod coordinator;
pub mod transfer;

pub use coordinator::TransferCoordinator;
pub use transfer::{Transfer, TransferId, TransferLine, TransferStatus};
