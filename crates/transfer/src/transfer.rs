use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockforge_catalog::{ItemId, WarehouseId};
use stockforge_core::{EntityId, StockError, StockResult};

/// Transfer identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(pub EntityId);

impl TransferId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TransferId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Transfer status lifecycle.
///
/// `InTransit` is the transient state while an execution attempt is posting
/// legs; it resolves to `Completed` or (after full compensation) `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Draft,
    InTransit,
    Completed,
    Cancelled,
    Failed,
}

impl core::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::InTransit => "in_transit",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One item/quantity pair to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLine {
    pub item_id: ItemId,
    pub quantity: i64,
}

/// A planned or executed stock movement between two warehouses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub from: WarehouseId,
    pub to: WarehouseId,
    pub status: TransferStatus,
    pub lines: Vec<TransferLine>,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl Transfer {
    /// Validate and create a Draft transfer. Invariant: `from != to`.
    pub fn new(
        from: WarehouseId,
        to: WarehouseId,
        lines: Vec<TransferLine>,
        created_at: DateTime<Utc>,
    ) -> StockResult<Self> {
        if from == to {
            return Err(StockError::validation(
                "transfer source and destination must differ",
            ));
        }
        if lines.is_empty() {
            return Err(StockError::validation("transfer needs at least one line"));
        }
        if lines.iter().any(|l| l.quantity <= 0) {
            return Err(StockError::validation("transfer quantities must be positive"));
        }
        let mut seen = HashSet::new();
        if !lines.iter().all(|l| seen.insert(l.item_id)) {
            return Err(StockError::validation("transfer lines must have distinct items"));
        }

        Ok(Self {
            id: TransferId::new(EntityId::new()),
            from,
            to,
            status: TransferStatus::Draft,
            lines,
            created_at,
            executed_at: None,
        })
    }
}
