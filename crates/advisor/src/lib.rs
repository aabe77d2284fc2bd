//! Read-only low-stock alerts and reorder suggestions.
//!
//! Pure functions over the catalog, the vendor directory and the level
//! projection; nothing here mutates state. Recomputed on demand — callers
//! that want a TTL cache put one in front.

pub mod advisor;

pub use advisor::{
    reorder_suggestions, stock_alerts, AlertSeverity, ReorderSuggestion, StockAlert,
};
