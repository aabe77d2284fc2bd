use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use stockforge_core::{EntityId, StockError, StockResult, VendorId};

/// Inventory item identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub EntityId);

impl ItemId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// SKU master data.
///
/// Monetary fields are in the smallest currency unit (e.g., cents),
/// currency-agnostic. `reorder_point == 0` means the item is untracked for
/// reorder purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub sku: String,
    pub name: String,
    pub unit_cost_minor: u64,
    pub sell_price_minor: u64,
    pub reorder_point: i64,
    pub reorder_quantity: i64,
    /// Mirror of the primary flag in the vendor directory, refreshed after
    /// the directory commits. The directory is authoritative: reorder
    /// recommendations read it, never this field, so a reader catching the
    /// mirror mid-update sees at worst a stale convenience value.
    pub primary_vendor: Option<VendorId>,
    pub active: bool,
}

/// Input for catalog entry. The catalog assigns the id and the active flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub sku: String,
    pub name: String,
    pub unit_cost_minor: u64,
    pub sell_price_minor: u64,
    pub reorder_point: i64,
    pub reorder_quantity: i64,
}

/// In-memory item catalog with a unique-SKU index.
///
/// Items are soft-retired only: once an item is referenced by ledger history
/// it must keep resolving, so there is no removal operation at all.
#[derive(Debug, Default)]
pub struct ItemCatalog {
    items: RwLock<HashMap<ItemId, Item>>,
    by_sku: RwLock<HashMap<String, ItemId>>,
}

impl ItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&self, new: NewItem) -> StockResult<Item> {
        if new.sku.trim().is_empty() {
            return Err(StockError::validation("sku cannot be empty"));
        }
        if new.name.trim().is_empty() {
            return Err(StockError::validation("name cannot be empty"));
        }
        if new.reorder_point < 0 || new.reorder_quantity < 0 {
            return Err(StockError::validation(
                "reorder point and reorder quantity cannot be negative",
            ));
        }

        let mut by_sku = self
            .by_sku
            .write()
            .map_err(|_| StockError::invariant("catalog lock poisoned"))?;
        if by_sku.contains_key(&new.sku) {
            return Err(StockError::conflict(format!("sku '{}' already exists", new.sku)));
        }

        let item = Item {
            id: ItemId::new(EntityId::new()),
            sku: new.sku.clone(),
            name: new.name,
            unit_cost_minor: new.unit_cost_minor,
            sell_price_minor: new.sell_price_minor,
            reorder_point: new.reorder_point,
            reorder_quantity: new.reorder_quantity,
            primary_vendor: None,
            active: true,
        };

        by_sku.insert(new.sku, item.id);
        let mut items = self
            .items
            .write()
            .map_err(|_| StockError::invariant("catalog lock poisoned"))?;
        items.insert(item.id, item.clone());
        Ok(item)
    }

    pub fn item(&self, id: ItemId) -> Option<Item> {
        let Ok(items) = self.items.read() else {
            return None;
        };
        items.get(&id).cloned()
    }

    /// Resolve a SKU string (e.g. from a barcode scan) to the item.
    pub fn find_by_sku(&self, sku: &str) -> Option<Item> {
        let id = {
            let Ok(by_sku) = self.by_sku.read() else {
                return None;
            };
            by_sku.get(sku).copied()?
        };
        self.item(id)
    }

    pub fn list(&self) -> Vec<Item> {
        let Ok(items) = self.items.read() else {
            return Vec::new();
        };
        items.values().cloned().collect()
    }

    /// Soft-retire: the item stays resolvable for ledger history.
    pub fn retire_item(&self, id: ItemId) -> StockResult<Item> {
        self.update(id, |item| item.active = false)
    }

    pub fn restore_item(&self, id: ItemId) -> StockResult<Item> {
        self.update(id, |item| item.active = true)
    }

    pub fn update_reorder_policy(
        &self,
        id: ItemId,
        reorder_point: i64,
        reorder_quantity: i64,
    ) -> StockResult<Item> {
        if reorder_point < 0 || reorder_quantity < 0 {
            return Err(StockError::validation(
                "reorder point and reorder quantity cannot be negative",
            ));
        }
        self.update(id, |item| {
            item.reorder_point = reorder_point;
            item.reorder_quantity = reorder_quantity;
        })
    }

    /// Record the primary vendor chosen through the vendor directory so item
    /// reads carry it. The directory owns the at-most-one-primary invariant.
    pub fn set_primary_vendor(&self, id: ItemId, vendor: Option<VendorId>) -> StockResult<Item> {
        self.update(id, |item| item.primary_vendor = vendor)
    }

    fn update(&self, id: ItemId, f: impl FnOnce(&mut Item)) -> StockResult<Item> {
        let mut items = self
            .items
            .write()
            .map_err(|_| StockError::invariant("catalog lock poisoned"))?;
        let item = items.get_mut(&id).ok_or_else(|| StockError::not_found("item"))?;
        f(item);
        Ok(item.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_item(sku: &str) -> NewItem {
        NewItem {
            sku: sku.to_string(),
            name: "Screen Assembly".to_string(),
            unit_cost_minor: 4500,
            sell_price_minor: 9900,
            reorder_point: 5,
            reorder_quantity: 20,
        }
    }

    #[test]
    fn add_item_assigns_id_and_indexes_sku() {
        let catalog = ItemCatalog::new();
        let item = catalog.add_item(new_item("SCR-001")).unwrap();

        assert!(item.active);
        assert_eq!(catalog.item(item.id).unwrap().sku, "SCR-001");
        assert_eq!(catalog.find_by_sku("SCR-001").unwrap().id, item.id);
    }

    #[test]
    fn duplicate_sku_is_a_conflict() {
        let catalog = ItemCatalog::new();
        catalog.add_item(new_item("SCR-001")).unwrap();

        let err = catalog.add_item(new_item("SCR-001")).unwrap_err();
        assert!(matches!(err, StockError::Conflict(_)));
    }

    #[test]
    fn retire_is_soft_and_reversible() {
        let catalog = ItemCatalog::new();
        let item = catalog.add_item(new_item("SCR-001")).unwrap();

        let retired = catalog.retire_item(item.id).unwrap();
        assert!(!retired.active);
        // Still resolvable for ledger history.
        assert!(catalog.item(item.id).is_some());

        let restored = catalog.restore_item(item.id).unwrap();
        assert!(restored.active);
    }

    #[test]
    fn reorder_policy_rejects_negative_values() {
        let catalog = ItemCatalog::new();
        let item = catalog.add_item(new_item("SCR-001")).unwrap();

        let err = catalog.update_reorder_policy(item.id, -1, 10).unwrap_err();
        assert!(matches!(err, StockError::Validation(_)));

        let updated = catalog.update_reorder_policy(item.id, 8, 25).unwrap();
        assert_eq!(updated.reorder_point, 8);
        assert_eq!(updated.reorder_quantity, 25);
    }

    #[test]
    fn unknown_item_is_not_found() {
        let catalog = ItemCatalog::new();
        let err = catalog.retire_item(ItemId::new(EntityId::new())).unwrap_err();
        assert_eq!(err, StockError::not_found("item"));
    }
}
