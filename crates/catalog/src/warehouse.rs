use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use stockforge_core::{EntityId, StockError, StockResult};

/// Warehouse identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WarehouseId(pub EntityId);

impl WarehouseId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for WarehouseId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Named stock location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
    pub active: bool,
}

/// In-memory warehouse registry. Warehouses are soft-retired only once they
/// hold stock history; the caller checks the stock book before retiring.
#[derive(Debug, Default)]
pub struct WarehouseRegistry {
    warehouses: RwLock<HashMap<WarehouseId, Warehouse>>,
}

impl WarehouseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_warehouse(&self, name: impl Into<String>) -> StockResult<Warehouse> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(StockError::validation("warehouse name cannot be empty"));
        }

        let warehouse = Warehouse {
            id: WarehouseId::new(EntityId::new()),
            name,
            active: true,
        };

        let mut warehouses = self
            .warehouses
            .write()
            .map_err(|_| StockError::invariant("registry lock poisoned"))?;
        warehouses.insert(warehouse.id, warehouse.clone());
        Ok(warehouse)
    }

    pub fn warehouse(&self, id: WarehouseId) -> Option<Warehouse> {
        let Ok(warehouses) = self.warehouses.read() else {
            return None;
        };
        warehouses.get(&id).cloned()
    }

    pub fn list(&self) -> Vec<Warehouse> {
        let Ok(warehouses) = self.warehouses.read() else {
            return Vec::new();
        };
        warehouses.values().cloned().collect()
    }

    pub fn retire_warehouse(&self, id: WarehouseId) -> StockResult<Warehouse> {
        self.update(id, |w| w.active = false)
    }

    pub fn restore_warehouse(&self, id: WarehouseId) -> StockResult<Warehouse> {
        self.update(id, |w| w.active = true)
    }

    fn update(&self, id: WarehouseId, f: impl FnOnce(&mut Warehouse)) -> StockResult<Warehouse> {
        let mut warehouses = self
            .warehouses
            .write()
            .map_err(|_| StockError::invariant("registry lock poisoned"))?;
        let warehouse = warehouses
            .get_mut(&id)
            .ok_or_else(|| StockError::not_found("warehouse"))?;
        f(warehouse);
        Ok(warehouse.clone())
    }
}
