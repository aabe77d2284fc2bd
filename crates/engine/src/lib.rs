//! `stockforge-engine` — the stock-control facade.
//!
//! Wires the catalog, warehouse registry, vendor directory, stock book,
//! transfer coordinator and count engine together behind one synchronous
//! API. Collaborators (repair tickets, identity, vendor directory) supply
//! reference ids, actors and vendor records; this crate owns the quantities.

pub mod engine;

pub use engine::StockEngine;

pub use stockforge_advisor::{AlertSeverity, ReorderSuggestion, StockAlert};
pub use stockforge_catalog::{
    Item, ItemId, NewItem, VendorLink, Warehouse, WarehouseId, DEFAULT_LEAD_TIME_DAYS,
};
pub use stockforge_core::{ActorId, EntityId, StockError, StockResult, VendorId};
pub use stockforge_counting::{CountId, CountStatus, StockCount, VarianceSummary};
pub use stockforge_ledger::{
    LedgerEntry, MovementFilter, MovementId, MovementReason, MovementReference, StockLevel,
};
pub use stockforge_transfer::{Transfer, TransferId, TransferLine, TransferStatus};
