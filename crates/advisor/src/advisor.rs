use serde::{Deserialize, Serialize};

use stockforge_catalog::{ItemCatalog, ItemId, VendorDirectory, WarehouseId};
use stockforge_core::VendorId;
use stockforge_ledger::StockBook;

/// Replenishment advice for one (item, warehouse) pair at or below its
/// reorder point. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderSuggestion {
    pub item_id: ItemId,
    pub warehouse_id: WarehouseId,
    pub current_quantity: i64,
    pub reorder_point: i64,
    /// Reorder quantity plus the shortfall below the reorder point.
    pub suggested_quantity: i64,
    pub recommended_vendor: Option<VendorId>,
    pub lead_time_days: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// At or below the reorder point.
    Warning,
    /// Nothing on hand.
    Critical,
}

/// Low-stock signal for dashboards. Derived on read, like suggestions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAlert {
    pub item_id: ItemId,
    pub warehouse_id: WarehouseId,
    pub current_quantity: i64,
    pub threshold: i64,
    pub severity: AlertSeverity,
    pub message: String,
}

/// Compute reorder suggestions for every (item, warehouse) pair whose
/// quantity is at or below the item's reorder point.
///
/// Items with `reorder_point == 0` are untracked for reorder and excluded,
/// as are retired items. The recommended vendor is the item's primary link
/// if set, else the cheapest link; lead time comes from that link.
pub fn reorder_suggestions(
    catalog: &ItemCatalog,
    vendors: &VendorDirectory,
    book: &StockBook,
) -> Vec<ReorderSuggestion> {
    let mut suggestions: Vec<ReorderSuggestion> = book
        .levels()
        .into_iter()
        .filter_map(|level| {
            let item = catalog.item(level.item_id)?;
            if !item.active || item.reorder_point == 0 {
                return None;
            }
            if level.quantity > item.reorder_point {
                return None;
            }

            let link = vendors.recommended_for(item.id);
            Some(ReorderSuggestion {
                item_id: item.id,
                warehouse_id: level.warehouse_id,
                current_quantity: level.quantity,
                reorder_point: item.reorder_point,
                suggested_quantity: item.reorder_quantity + (item.reorder_point - level.quantity),
                recommended_vendor: link.as_ref().map(|l| l.vendor_id),
                lead_time_days: link.map(|l| l.lead_time_days),
            })
        })
        .collect();

    suggestions.sort_by_key(|s| (s.item_id, s.warehouse_id));
    suggestions
}

/// Compute low-stock alerts: Critical when a tracked item is out of stock,
/// Warning when it sits at or below its reorder point.
pub fn stock_alerts(catalog: &ItemCatalog, book: &StockBook) -> Vec<StockAlert> {
    let mut alerts: Vec<StockAlert> = book
        .levels()
        .into_iter()
        .filter_map(|level| {
            let item = catalog.item(level.item_id)?;
            if !item.active || item.reorder_point == 0 {
                return None;
            }
            if level.quantity > item.reorder_point {
                return None;
            }

            let (severity, message) = if level.quantity == 0 {
                (AlertSeverity::Critical, format!("{} is out of stock", item.name))
            } else {
                (
                    AlertSeverity::Warning,
                    format!(
                        "{} is low: {} on hand, reorder point {}",
                        item.name, level.quantity, item.reorder_point
                    ),
                )
            };

            Some(StockAlert {
                item_id: item.id,
                warehouse_id: level.warehouse_id,
                current_quantity: level.quantity,
                threshold: item.reorder_point,
                severity,
                message,
            })
        })
        .collect();

    alerts.sort_by_key(|a| (a.item_id, a.warehouse_id));
    alerts
}
