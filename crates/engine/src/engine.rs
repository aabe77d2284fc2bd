use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use stockforge_advisor::{reorder_suggestions, stock_alerts, ReorderSuggestion, StockAlert};
use stockforge_catalog::{
    Item, ItemCatalog, ItemId, NewItem, VendorDirectory, VendorLink, Warehouse, WarehouseId,
    WarehouseRegistry,
};
use stockforge_core::{ActorId, StockError, StockResult, VendorId};
use stockforge_counting::{CountEngine, CountId, StockCount, VarianceSummary};
use stockforge_ledger::{
    LedgerEntry, MovementFilter, MovementReason, MovementReference, NewMovement, StockBook,
    StockLevel,
};
use stockforge_transfer::{Transfer, TransferCoordinator, TransferId, TransferLine};

/// The stock-control engine facade.
///
/// Every call is synchronous and returns either the resulting entity or a
/// typed `StockError`. The facade validates master data (items, warehouses)
/// before touching the book; quantity rules live in the book itself.
#[derive(Debug)]
pub struct StockEngine {
    catalog: ItemCatalog,
    warehouses: WarehouseRegistry,
    vendors: VendorDirectory,
    book: Arc<StockBook>,
    transfers: TransferCoordinator,
    counts: CountEngine,
}

impl Default for StockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StockEngine {
    pub fn new() -> Self {
        let book = Arc::new(StockBook::new());
        Self {
            catalog: ItemCatalog::new(),
            warehouses: WarehouseRegistry::new(),
            vendors: VendorDirectory::new(),
            transfers: TransferCoordinator::new(Arc::clone(&book)),
            counts: CountEngine::new(Arc::clone(&book)),
            book,
        }
    }

    // --- catalog & registry -------------------------------------------------

    pub fn add_item(&self, new: NewItem) -> StockResult<Item> {
        let item = self.catalog.add_item(new)?;
        info!(item = %item.id, sku = %item.sku, "item added to catalog");
        Ok(item)
    }

    pub fn item(&self, id: ItemId) -> Option<Item> {
        self.catalog.item(id)
    }

    /// Resolve a scanned SKU string to its item.
    pub fn find_by_sku(&self, sku: &str) -> Option<Item> {
        self.catalog.find_by_sku(sku)
    }

    pub fn list_items(&self) -> Vec<Item> {
        self.catalog.list()
    }

    pub fn retire_item(&self, id: ItemId) -> StockResult<Item> {
        self.catalog.retire_item(id)
    }

    pub fn restore_item(&self, id: ItemId) -> StockResult<Item> {
        self.catalog.restore_item(id)
    }

    pub fn update_reorder_policy(
        &self,
        id: ItemId,
        reorder_point: i64,
        reorder_quantity: i64,
    ) -> StockResult<Item> {
        self.catalog.update_reorder_policy(id, reorder_point, reorder_quantity)
    }

    pub fn add_warehouse(&self, name: impl Into<String>) -> StockResult<Warehouse> {
        self.warehouses.add_warehouse(name)
    }

    pub fn warehouse(&self, id: WarehouseId) -> Option<Warehouse> {
        self.warehouses.warehouse(id)
    }

    pub fn list_warehouses(&self) -> Vec<Warehouse> {
        self.warehouses.list()
    }

    /// Soft-retire a warehouse. Refused while it still holds stock; move or
    /// correct the stock out first.
    pub fn retire_warehouse(&self, id: WarehouseId) -> StockResult<Warehouse> {
        self.require_warehouse(id)?;
        if self.book.has_stock(id) {
            return Err(StockError::validation(
                "warehouse still holds stock; transfer or correct it out before retiring",
            ));
        }
        let retired = self.warehouses.retire_warehouse(id)?;
        // A receive can land between the check and the retire. Once the
        // warehouse is inactive new receipts stop passing validation, so a
        // recheck catches the straggler and backs the retirement out.
        if self.book.has_stock(id) {
            self.warehouses.restore_warehouse(id)?;
            return Err(StockError::validation(
                "warehouse still holds stock; transfer or correct it out before retiring",
            ));
        }
        Ok(retired)
    }

    pub fn restore_warehouse(&self, id: WarehouseId) -> StockResult<Warehouse> {
        self.warehouses.restore_warehouse(id)
    }

    // --- vendor links -------------------------------------------------------

    pub fn upsert_vendor_link(
        &self,
        item_id: ItemId,
        vendor_id: VendorId,
        price_minor: u64,
        lead_time_days: Option<u32>,
    ) -> StockResult<VendorLink> {
        self.require_item(item_id)?;
        self.vendors.upsert_link(item_id, vendor_id, price_minor, lead_time_days)
    }

    /// Make `vendor_id` the single primary vendor for the item.
    ///
    /// The vendor directory is the source of truth and commits first; the
    /// catalog's `primary_vendor` field is a convenience mirror updated
    /// after. Items are never removed, so the mirror write cannot fail once
    /// `require_item` has passed.
    pub fn set_primary_vendor(&self, item_id: ItemId, vendor_id: VendorId) -> StockResult<VendorLink> {
        self.require_item(item_id)?;
        let link = self.vendors.set_primary(item_id, vendor_id)?;
        self.catalog.set_primary_vendor(item_id, Some(vendor_id))?;
        Ok(link)
    }

    /// Remove a link. If it was the primary, the item is left with no
    /// primary vendor; callers re-select explicitly.
    pub fn remove_vendor_link(&self, item_id: ItemId, vendor_id: VendorId) -> StockResult<()> {
        let was_primary = self
            .vendors
            .primary_for(item_id)
            .is_some_and(|l| l.vendor_id == vendor_id);
        self.vendors.remove_link(item_id, vendor_id)?;
        if was_primary {
            self.catalog.set_primary_vendor(item_id, None)?;
        }
        Ok(())
    }

    pub fn vendor_links(&self, item_id: ItemId) -> Vec<VendorLink> {
        self.vendors.links_for(item_id)
    }

    // --- movements ----------------------------------------------------------

    /// Post one quantity-affecting movement.
    ///
    /// Item and warehouse must exist; stock may only be received into active
    /// ones (draining a retired location stays allowed). Quantity rules
    /// (non-zero delta, never-negative result, version guard) are enforced
    /// by the book.
    pub fn post_movement(
        &self,
        item_id: ItemId,
        warehouse_id: WarehouseId,
        delta: i64,
        reason: MovementReason,
        reference: MovementReference,
        actor: ActorId,
        at: DateTime<Utc>,
    ) -> StockResult<LedgerEntry> {
        let item = self.require_item(item_id)?;
        let warehouse = self.require_warehouse(warehouse_id)?;
        if delta > 0 && (!item.active || !warehouse.active) {
            return Err(StockError::validation(
                "cannot receive stock into a retired item or warehouse",
            ));
        }

        let result = self.book.post_movement(NewMovement {
            item_id,
            warehouse_id,
            delta,
            reason,
            reference,
            occurred_at: at,
            actor,
        });

        match &result {
            Ok(entry) => info!(
                movement = %entry.id,
                item = %item_id,
                warehouse = %warehouse_id,
                delta,
                reason = %reason,
                "stock movement posted"
            ),
            Err(err) if err.is_recoverable() => warn!(
                item = %item_id,
                warehouse = %warehouse_id,
                delta,
                reason = %reason,
                %err,
                "stock movement rejected"
            ),
            Err(err @ StockError::InvariantViolation(_)) => error!(
                item = %item_id,
                warehouse = %warehouse_id,
                %err,
                "stock movement refused"
            ),
            Err(_) => {}
        }
        result
    }

    /// Current level for the pair; reads the projection only.
    pub fn get_level(&self, item_id: ItemId, warehouse_id: WarehouseId) -> Option<StockLevel> {
        self.book.level(item_id, warehouse_id)
    }

    /// On-hand quantity; 0 when the pair has never moved.
    pub fn quantity(&self, item_id: ItemId, warehouse_id: WarehouseId) -> i64 {
        self.book.quantity(item_id, warehouse_id)
    }

    pub fn movements(&self, filter: &MovementFilter) -> Vec<LedgerEntry> {
        self.book.movements(filter)
    }

    /// Maintenance: verify the projection against the ledger sum, poisoning
    /// the pair on disagreement.
    pub fn rebuild_level(&self, item_id: ItemId, warehouse_id: WarehouseId) -> StockResult<StockLevel> {
        self.book.rebuild_level(item_id, warehouse_id)
    }

    /// Operator action: reset a poisoned pair's projection from the ledger.
    pub fn repair_level(&self, item_id: ItemId, warehouse_id: WarehouseId) -> StockResult<StockLevel> {
        self.book.repair_level(item_id, warehouse_id)
    }

    // --- transfers ----------------------------------------------------------

    pub fn create_transfer(
        &self,
        from: WarehouseId,
        to: WarehouseId,
        lines: Vec<TransferLine>,
        at: DateTime<Utc>,
    ) -> StockResult<Transfer> {
        self.require_active_warehouse(from)?;
        self.require_active_warehouse(to)?;
        for line in &lines {
            self.require_item(line.item_id)?;
        }
        self.transfers.create_transfer(from, to, lines, at)
    }

    pub fn execute_transfer(
        &self,
        id: TransferId,
        actor: ActorId,
        at: DateTime<Utc>,
    ) -> StockResult<Transfer> {
        self.transfers.execute_transfer(id, actor, at)
    }

    pub fn cancel_transfer(&self, id: TransferId) -> StockResult<Transfer> {
        self.transfers.cancel_transfer(id)
    }

    pub fn transfer(&self, id: TransferId) -> Option<Transfer> {
        self.transfers.transfer(id)
    }

    // --- counts -------------------------------------------------------------

    pub fn open_count(
        &self,
        warehouse_id: WarehouseId,
        item_ids: Vec<ItemId>,
        at: DateTime<Utc>,
    ) -> StockResult<StockCount> {
        self.require_warehouse(warehouse_id)?;
        for item_id in &item_ids {
            self.require_item(*item_id)?;
        }
        self.counts.open_count(warehouse_id, item_ids, at)
    }

    pub fn record_count(&self, id: CountId, item_id: ItemId, counted: i64) -> StockResult<StockCount> {
        self.counts.record_count(id, item_id, counted)
    }

    pub fn reconcile(&self, id: CountId, actor: ActorId, at: DateTime<Utc>) -> StockResult<StockCount> {
        self.counts.reconcile(id, actor, at)
    }

    pub fn close_count(&self, id: CountId) -> StockResult<StockCount> {
        self.counts.close_count(id)
    }

    pub fn cancel_count(&self, id: CountId) -> StockResult<StockCount> {
        self.counts.cancel_count(id)
    }

    pub fn count(&self, id: CountId) -> Option<StockCount> {
        self.counts.count(id)
    }

    pub fn variance_summary(&self, id: CountId) -> StockResult<VarianceSummary> {
        self.counts.variance_summary(id)
    }

    // --- advisor ------------------------------------------------------------

    pub fn list_reorder_suggestions(&self) -> Vec<ReorderSuggestion> {
        reorder_suggestions(&self.catalog, &self.vendors, &self.book)
    }

    pub fn list_stock_alerts(&self) -> Vec<StockAlert> {
        stock_alerts(&self.catalog, &self.book)
    }

    // --- helpers ------------------------------------------------------------

    fn require_item(&self, id: ItemId) -> StockResult<Item> {
        self.catalog.item(id).ok_or_else(|| StockError::not_found("item"))
    }

    fn require_warehouse(&self, id: WarehouseId) -> StockResult<Warehouse> {
        self.warehouses
            .warehouse(id)
            .ok_or_else(|| StockError::not_found("warehouse"))
    }

    fn require_active_warehouse(&self, id: WarehouseId) -> StockResult<Warehouse> {
        let warehouse = self.require_warehouse(id)?;
        if !warehouse.active {
            return Err(StockError::validation("warehouse is retired"));
        }
        Ok(warehouse)
    }
}
