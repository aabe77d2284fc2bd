//! Item catalog, warehouse registry and item–vendor association.
//!
//! Master data only: nothing in this crate touches stock quantities. Items
//! and warehouses are soft-retired, never removed, so ledger history always
//! resolves.

pub mod item;
pub mod vendor_link;
pub mod warehouse;

pub use item::{Item, ItemCatalog, ItemId, NewItem};
pub use vendor_link::{VendorDirectory, VendorLink, DEFAULT_LEAD_TIME_DAYS};
pub use warehouse::{Warehouse, WarehouseId, WarehouseRegistry};
